//! Common types used across the conversion pipeline.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a single statement transaction.
///
/// This is the canonical record produced by validation and consumed
/// read-only by the serializer; it is never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Date the transaction was posted.
    pub date: NaiveDate,

    /// Free-form transaction description, non-empty after normalization.
    /// Stored unescaped; markup escaping happens at serialization time.
    pub description: String,

    /// Signed amount: negative for debits/withdrawals/payments, positive
    /// for credits/deposits. A single currency is assumed per run.
    pub amount: Decimal,
}

impl Transaction {
    /// Transaction type derived from the amount sign.
    pub fn kind(&self) -> TransactionKind {
        if self.amount > Decimal::ZERO {
            TransactionKind::Credit
        } else {
            TransactionKind::Debit
        }
    }
}

/// Credit/debit indicator derived purely from the amount sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Incoming funds (positive amount).
    Credit,
    /// Outgoing funds (zero or negative amount).
    Debit,
}

impl TransactionKind {
    /// OFX transaction type label.
    pub fn as_ofx(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "CREDIT",
            TransactionKind::Debit => "DEBIT",
        }
    }
}

/// Loosely-typed record as returned by the extraction capability.
///
/// Every field is optional at this stage; [`crate::normalize::normalize`]
/// decides which records survive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Kept as a JSON number so the decimal representation survives intact.
    #[serde(default)]
    pub amount: Option<serde_json::Number>,
}

/// A bounded, line-aligned segment of the statement text.
///
/// Exists only for the duration of one pipeline run; owned by the
/// orchestrator and handed to the extraction client chunk by chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,

    /// 1-based position within the run.
    pub index: usize,

    /// Total number of chunks in the run.
    pub total: usize,
}

/// Externally observable progress state of a conversion run.
///
/// `Idle` holds before the first run; `Processing` for the whole chunk
/// loop; `Success` and `Error` are terminal per run. A new run resets the
/// state directly to `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_from_sign() {
        let mut t = Transaction {
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            description: "Coffee".into(),
            amount: Decimal::from_str("-4.5").unwrap(),
        };
        assert_eq!(t.kind(), TransactionKind::Debit);

        t.amount = Decimal::from_str("12.00").unwrap();
        assert_eq!(t.kind(), TransactionKind::Credit);

        t.amount = Decimal::ZERO;
        assert_eq!(t.kind(), TransactionKind::Debit);
    }

    #[test]
    fn test_raw_record_tolerates_missing_fields() {
        let record: RawRecord = serde_json::from_str(r#"{"date": "2024-03-05"}"#).unwrap();
        assert_eq!(record.date.as_deref(), Some("2024-03-05"));
        assert!(record.description.is_none());
        assert!(record.amount.is_none());
    }
}
