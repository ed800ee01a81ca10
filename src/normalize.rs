//! Validation and normalization of extracted records.
//!
//! Raw records coming back from the extraction capability are loosely
//! typed; this module turns them into canonical [`Transaction`]s and drops
//! anything malformed. Dropped records never fail a run.

use crate::error::{Error, Result};
use crate::types::{RawRecord, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Date formats the extraction capability has been observed to produce.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", // 2024-03-05
    "%Y/%m/%d", // 2024/03/05
    "%d.%m.%Y", // 05.03.2024
    "%d/%m/%Y", // 05/03/2024
    "%m/%d/%Y", // 03/05/2024
    "%Y%m%d",   // 20240305
    "%b %d, %Y", // Mar 5, 2024
    "%d %b %Y", // 5 Mar 2024
];

/// Convert a loosely-typed extracted record into a canonical [`Transaction`].
///
/// Returns `None` when a required field is missing (`amount` may be zero
/// but not absent), the date cannot be parsed, or the description is empty
/// after trimming. Rejected records are excluded from the batch silently.
pub fn normalize(record: &RawRecord) -> Option<Transaction> {
    let date = record.date.as_deref()?;
    let description = record.description.as_deref()?.trim();
    let amount = record.amount.as_ref()?;

    if description.is_empty() {
        return None;
    }

    let date = match parse_date(date) {
        Ok(date) => date,
        Err(e) => {
            tracing::debug!("dropping record: {e}");
            return None;
        }
    };

    let amount = match parse_amount(amount) {
        Ok(amount) => amount,
        Err(e) => {
            tracing::debug!("dropping record: {e}");
            return None;
        }
    };

    Some(Transaction {
        date,
        description: description.to_string(),
        amount,
    })
}

/// Parse a date against the known set of formats.
fn parse_date(date_str: &str) -> Result<NaiveDate> {
    let trimmed = date_str.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }

    Err(Error::InvalidDate(date_str.to_string()))
}

/// Convert a JSON number to a `Decimal` via its decimal representation,
/// avoiding a lossy float round-trip.
fn parse_amount(amount: &serde_json::Number) -> Result<Decimal> {
    Decimal::from_str(&amount.to_string()).map_err(|_| Error::InvalidAmount(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use pretty_assertions::assert_eq;

    fn record(json: &str) -> RawRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_normalizes_a_complete_record() {
        let record = record(r#"{"date": "2024-03-05", "description": "Coffee", "amount": -4.5}"#);
        let transaction = normalize(&record).unwrap();

        assert_eq!(transaction.date.format("%Y%m%d").to_string(), "20240305");
        assert_eq!(transaction.description, "Coffee");
        assert_eq!(transaction.amount, Decimal::from_str("-4.5").unwrap());
    }

    #[test]
    fn test_missing_amount_is_dropped() {
        let record = record(r#"{"date": "2024-03-05", "description": "Coffee"}"#);
        assert_eq!(normalize(&record), None);
    }

    #[test]
    fn test_zero_amount_is_kept() {
        let record = record(r#"{"date": "2024-03-05", "description": "Fee waiver", "amount": 0}"#);
        let transaction = normalize(&record).unwrap();
        assert_eq!(transaction.amount, Decimal::ZERO);
    }

    #[test]
    fn test_missing_date_is_dropped() {
        let record = record(r#"{"description": "Coffee", "amount": -4.5}"#);
        assert_eq!(normalize(&record), None);
    }

    #[test]
    fn test_unparseable_date_is_dropped() {
        let record = record(r#"{"date": "sometime in march", "description": "Coffee", "amount": -4.5}"#);
        assert_eq!(normalize(&record), None);
    }

    #[test]
    fn test_blank_description_is_dropped() {
        let record = record(r#"{"date": "2024-03-05", "description": "   ", "amount": -4.5}"#);
        assert_eq!(normalize(&record), None);
    }

    #[test]
    fn test_parse_date_accepts_common_formats() {
        for input in ["2024-03-05", "05.03.2024", "2024/03/05", "20240305", "Mar 5, 2024"] {
            let date = parse_date(input).unwrap();
            assert_eq!(date.year(), 2024, "{input}");
            assert_eq!(date.month(), 3, "{input}");
            assert_eq!(date.day(), 5, "{input}");
        }
    }

    #[test]
    fn test_amount_keeps_decimal_representation() {
        let record = record(r#"{"date": "2024-03-05", "description": "Rent", "amount": -1540.1}"#);
        let transaction = normalize(&record).unwrap();
        assert_eq!(transaction.amount.to_string(), "-1540.1");
    }
}
