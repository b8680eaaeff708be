//! # Input Validation
//!
//! Field-level rules applied to user drafts before they are queued or sent.
//! Each function validates one concern and returns the first problem found.

use chrono::{NaiveDate, NaiveTime};

use crate::error::ValidationError;

/// Longest accepted free-text field (names, locations, categories).
pub const MAX_SHORT_TEXT: usize = 120;

/// Longest accepted description (problem text, purpose).
pub const MAX_LONG_TEXT: usize = 2000;

/// Upper bound on any stock count.
pub const MAX_STOCK: i64 = 1_000_000;

/// Fails when `value` is empty or whitespace only.
pub fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Fails when `value` has more than `max` characters.
pub fn max_len(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Required short text: non-empty and at most [`MAX_SHORT_TEXT`] characters.
pub fn short_text(field: &str, value: &str) -> Result<(), ValidationError> {
    require(field, value)?;
    max_len(field, value, MAX_SHORT_TEXT)
}

/// WhatsApp number: optional leading `+`, then 8 to 15 digits.
/// Spaces and dashes are ignored.
pub fn whatsapp(field: &str, value: &str) -> Result<(), ValidationError> {
    require(field, value)?;
    let compact: String = value
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "only digits are allowed".to_string(),
        });
    }
    if !(8..=15).contains(&digits.len()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected 8 to 15 digits".to_string(),
        });
    }
    Ok(())
}

/// Calendar date in `YYYY-MM-DD` form.
pub fn date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    require(field, value)?;
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected YYYY-MM-DD".to_string(),
        }
    })
}

/// Time of day in `HH:MM` form.
pub fn time(field: &str, value: &str) -> Result<NaiveTime, ValidationError> {
    require(field, value)?;
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "expected HH:MM".to_string(),
    })
}

/// Both times parse and `end` is strictly after `start`.
pub fn time_range(
    start_field: &str,
    start: &str,
    end_field: &str,
    end: &str,
) -> Result<(), ValidationError> {
    let start_t = time(start_field, start)?;
    let end_t = time(end_field, end)?;
    if end_t <= start_t {
        return Err(ValidationError::InvalidRange {
            start_field: start_field.to_string(),
            end_field: end_field.to_string(),
        });
    }
    Ok(())
}

/// Stock count within `0..=MAX_STOCK`.
pub fn stock(field: &str, value: i64) -> Result<(), ValidationError> {
    if !(0..=MAX_STOCK).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert!(require("nama", "Budi").is_ok());
        assert!(matches!(
            require("nama", "   "),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_max_len_counts_chars() {
        assert!(max_len("x", "ééé", 3).is_ok());
        assert!(max_len("x", "éééé", 3).is_err());
    }

    #[test]
    fn test_whatsapp() {
        assert!(whatsapp("whatsapp", "0812-3456-7890").is_ok());
        assert!(whatsapp("whatsapp", "+62 812 3456 7890").is_ok());
        assert!(whatsapp("whatsapp", "12345").is_err());
        assert!(whatsapp("whatsapp", "08abc").is_err());
    }

    #[test]
    fn test_date_and_time() {
        assert!(date("tanggal", "2024-02-29").is_ok());
        assert!(date("tanggal", "2023-02-29").is_err());
        assert!(time("mulai", "07:30").is_ok());
        assert!(time("mulai", "25:00").is_err());
    }

    #[test]
    fn test_time_range() {
        assert!(time_range("mulai", "07:30", "selesai", "09:00").is_ok());
        assert!(matches!(
            time_range("mulai", "09:00", "selesai", "09:00"),
            Err(ValidationError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_stock_bounds() {
        assert!(stock("stokSekarang", 0).is_ok());
        assert!(stock("stokSekarang", -1).is_err());
        assert!(stock("stokSekarang", MAX_STOCK + 1).is_err());
    }
}
