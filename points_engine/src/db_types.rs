use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use pts_common::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The reserved account that carries the counter-side of every ledger transaction, so that the
/// postings of a journal always sum to zero.
pub const SYSTEM_USER_ID: i64 = 1;

//--------------------------------------        User        ----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub login: String,
    /// Opaque digest produced by the server's credential-hashing contract.
    pub password_digest: String,
}

//--------------------------------------     OrderStatus    ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// The order has been admitted and no accrual information has been received yet.
    New,
    /// The accrual system has acknowledged the order and is still calculating the reward.
    Processing,
    /// The accrual system rejected the order. Terminal.
    Invalid,
    /// The accrual has been calculated and credited to the owner. Terminal.
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::Processing => write!(f, "PROCESSING"),
            OrderStatus::Invalid => write!(f, "INVALID"),
            OrderStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to NEW");
            OrderStatus::New
        })
    }
}

//--------------------------------------        Order       ----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Order {
    pub id: i64,
    /// The Luhn-valid order number submitted by the user. Unique across the system.
    pub number: String,
    pub user_id: i64,
    pub status: OrderStatus,
    pub uploaded_at: DateTime<Utc>,
    /// Set when the order reaches a terminal status.
    pub processed_at: Option<DateTime<Utc>>,
    /// The user-side accrual amount. Only populated on listing queries, and only for orders that
    /// have been credited.
    pub accrual: Option<Point>,
}

/// A non-terminal order discovered at startup, whose polling must be resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub id: i64,
    pub number: String,
    pub user_id: i64,
}

//--------------------------------------      Balance       ----------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub current: Point,
    pub withdrawn: Point,
}

//--------------------------------------     Withdrawal     ----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    /// The order reference supplied by the client when withdrawing. A free label; it does not have
    /// to match an admitted order.
    pub order_number: String,
    pub amount: Point,
    pub processed_at: DateTime<Utc>,
}

//--------------------------------------    JournalType     ----------------------------------------------------------
/// The business reason that groups the paired postings of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalType {
    Deposit,
    Withdrawal,
}

impl Display for JournalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalType::Deposit => write!(f, "deposit"),
            JournalType::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_status_round_trips_through_strings() {
        for status in [OrderStatus::New, OrderStatus::Processing, OrderStatus::Invalid, OrderStatus::Processed] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("PAID".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(OrderStatus::Processed.is_terminal());
    }
}
