//! Luhn checksum validation for order numbers.

/// Checks that `number` is a non-empty string of decimal digits passing the Luhn checksum.
///
/// Works on the digit string directly, so numbers of any length validate without overflowing an
/// integer parse.
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[cfg(test)]
mod test {
    use super::is_valid;

    #[test]
    fn accepts_valid_numbers() {
        assert!(is_valid("6122"));
        assert!(is_valid("79927398713"));
        assert!(is_valid("4539578763621486"));
        assert!(is_valid("378282246310005"));
        assert!(is_valid("0"));
    }

    #[test]
    fn rejects_invalid_checksums() {
        assert!(!is_valid("1234"));
        assert!(!is_valid("79927398710"));
        assert!(!is_valid("6123"));
    }

    #[test]
    fn rejects_non_digit_input() {
        assert!(!is_valid(""));
        assert!(!is_valid(" 6122"));
        assert!(!is_valid("61-22"));
        assert!(!is_valid("six"));
        assert!(!is_valid("٦١٢٢"));
    }

    #[test]
    fn does_not_overflow_on_long_numbers() {
        let zeros = "0".repeat(64);
        assert!(is_valid(&zeros));
    }
}
