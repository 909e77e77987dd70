use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of centi-points in one point.
pub const CENTI_POINTS_PER_POINT: i64 = 100;

//--------------------------------------       Point       -----------------------------------------------------------
/// A loyalty-point amount, stored as a signed 64-bit count of centi-points.
///
/// All ledger arithmetic happens on this integer representation. Decimal values only exist at the
/// edges of the system (HTTP payloads and the accrual system), and those edges are expected to
/// reject negative amounts before converting.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Point(i64);

op!(binary Point, Add, add);
op!(binary Point, Sub, sub);
op!(inplace Point, AddAssign, add_assign);
op!(inplace Point, SubAssign, sub_assign);
op!(unary Point, Neg, neg);

impl Sum for Point {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in centi-points: {0}")]
pub struct PointConversionError(String);

impl From<i64> for Point {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Point {}

impl TryFrom<f64> for Point {
    type Error = PointConversionError;

    /// Converts a decimal point amount into centi-points. Only defined for non-negative finite
    /// inputs; callers at the HTTP and accrual boundaries must reject negative amounts first.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value < 0.0 {
            return Err(PointConversionError(format!("{value} is not a non-negative amount")));
        }
        let centi = value * CENTI_POINTS_PER_POINT as f64 + 0.5;
        if centi >= i64::MAX as f64 {
            return Err(PointConversionError(format!("{value} is too large")));
        }
        Ok(Self(centi as i64))
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0.2}pt", self.as_decimal())
    }
}

impl Point {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_points(points: i64) -> Self {
        Self(points * CENTI_POINTS_PER_POINT)
    }

    /// The decimal representation used in HTTP payloads.
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / CENTI_POINTS_PER_POINT as f64
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decimal_conversions() {
        assert_eq!(Point::try_from(300.12).unwrap(), Point::from(30012));
        assert_eq!(Point::try_from(0.0).unwrap(), Point::from(0));
        assert_eq!(Point::try_from(2.0).unwrap(), Point::from(200));
        // truncation after adding half a centi-point rounds to nearest
        assert_eq!(Point::try_from(0.016).unwrap(), Point::from(2));
        assert_eq!(Point::try_from(0.014).unwrap(), Point::from(1));
    }

    #[test]
    fn negative_and_non_finite_amounts_are_rejected() {
        assert!(Point::try_from(-0.01).is_err());
        assert!(Point::try_from(f64::NAN).is_err());
        assert!(Point::try_from(f64::INFINITY).is_err());
    }

    #[test]
    fn round_trips_through_decimal() {
        for p in [0i64, 1, 99, 100, 30012, 50000, 123_456_789] {
            let point = Point::from(p);
            assert_eq!(Point::try_from(point.as_decimal()).unwrap(), point);
        }
    }

    #[test]
    fn arithmetic() {
        let a = Point::from(30012);
        let b = Point::from(12);
        assert_eq!(a + b, Point::from(30024));
        assert_eq!(a - b, Point::from(30000));
        assert_eq!(-b, Point::from(-12));
        let mut c = a;
        c -= b;
        assert_eq!(c, Point::from(30000));
        let total: Point = [a, b].into_iter().sum();
        assert_eq!(total, Point::from(30024));
    }

    #[test]
    fn display_uses_decimal_points() {
        assert_eq!(Point::from(30012).to_string(), "300.12pt");
        assert_eq!(Point::from(5).to_string(), "0.05pt");
    }
}
