//! OFX 1.02 format serializer.
//!
//! OFX 1.x is an SGML-flavored plaintext format: a colon-delimited header
//! block followed by a nested tag body. Leaf tags carry their value on the
//! same line; aggregate tags are closed explicitly.

use crate::error::Result;
use crate::types::Transaction;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::io::Write;

/// Literal prefix identifying a document already in the target format.
pub const OFX_HEADER_MARKER: &str = "OFXHEADER";

/// Hard limit on the FITID field imposed by the format.
const FITID_MAX_LEN: usize = 255;

/// Maximum length of the sanitized description used inside a FITID.
const FITID_DESC_LEN: usize = 50;

/// Identifiers written into the account and balance sections.
///
/// The pipeline has no authoritative source for these, so they are injected
/// configuration rather than literals baked into the serializer. The ledger
/// balance is a known-approximate placeholder.
#[derive(Debug, Clone)]
pub struct OfxConfig {
    pub bank_id: String,
    pub account_id: String,
    pub account_type: String,
    pub currency: String,
    pub ledger_balance: Decimal,
}

impl Default for OfxConfig {
    fn default() -> Self {
        Self {
            bank_id: "123456789".to_string(),
            account_id: "000000001".to_string(),
            account_type: "CHECKING".to_string(),
            currency: "USD".to_string(),
            ledger_balance: Decimal::ZERO,
        }
    }
}

/// An OFX document assembled from extracted transactions.
#[derive(Debug, Clone)]
pub struct OfxDocument {
    /// Transactions in extraction order; sorted by date during rendering.
    pub transactions: Vec<Transaction>,
    pub config: OfxConfig,
}

impl OfxDocument {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            config: OfxConfig::default(),
        }
    }

    pub fn with_config(transactions: Vec<Transaction>, config: OfxConfig) -> Self {
        Self {
            transactions,
            config,
        }
    }

    /// Render the document to an in-memory string.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write the document to any destination implementing `Write`.
    ///
    /// Rendering is deterministic for a fixed transaction list: records are
    /// stable-sorted by date (ties keep input order) and every field is
    /// derived from the record or the injected config. Only the statement
    /// bounds of an empty document depend on the current date.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut sorted = self.transactions.clone();
        sorted.sort_by_key(|t| t.date);

        let today = chrono::Utc::now().date_naive();
        let start = sorted.first().map(|t| t.date).unwrap_or(today);
        let end = sorted.last().map(|t| t.date).unwrap_or(today);

        // Plaintext declaration block.
        writeln!(writer, "OFXHEADER:100")?;
        writeln!(writer, "DATA:OFXSGML")?;
        writeln!(writer, "VERSION:102")?;
        writeln!(writer, "SECURITY:NONE")?;
        writeln!(writer, "ENCODING:USASCII")?;
        writeln!(writer, "CHARSET:1252")?;
        writeln!(writer, "COMPRESSION:NONE")?;
        writeln!(writer, "OLDFILEUID:NONE")?;
        writeln!(writer, "NEWFILEUID:NONE")?;
        writeln!(writer)?;

        writeln!(writer, "<OFX>")?;

        // Sign-on acknowledgment with a fixed success status.
        writeln!(writer, "<SIGNONMSGSRSV1>")?;
        writeln!(writer, "<SONRS>")?;
        writeln!(writer, "<STATUS>")?;
        writeln!(writer, "<CODE>0")?;
        writeln!(writer, "<SEVERITY>INFO")?;
        writeln!(writer, "</STATUS>")?;
        writeln!(writer, "<DTSERVER>{}", format_ofx_date(&today))?;
        writeln!(writer, "<LANGUAGE>ENG")?;
        writeln!(writer, "</SONRS>")?;
        writeln!(writer, "</SIGNONMSGSRSV1>")?;

        writeln!(writer, "<BANKMSGSRSV1>")?;
        writeln!(writer, "<STMTTRNRS>")?;
        writeln!(writer, "<TRNUID>1")?;
        writeln!(writer, "<STATUS>")?;
        writeln!(writer, "<CODE>0")?;
        writeln!(writer, "<SEVERITY>INFO")?;
        writeln!(writer, "</STATUS>")?;
        writeln!(writer, "<STMTRS>")?;
        writeln!(writer, "<CURDEF>{}", self.config.currency)?;

        writeln!(writer, "<BANKACCTFROM>")?;
        writeln!(writer, "<BANKID>{}", self.config.bank_id)?;
        writeln!(writer, "<ACCTID>{}", self.config.account_id)?;
        writeln!(writer, "<ACCTTYPE>{}", self.config.account_type)?;
        writeln!(writer, "</BANKACCTFROM>")?;

        writeln!(writer, "<BANKTRANLIST>")?;
        writeln!(writer, "<DTSTART>{}", format_ofx_date(&start))?;
        writeln!(writer, "<DTEND>{}", format_ofx_date(&end))?;

        for (position, transaction) in sorted.iter().enumerate() {
            writeln!(writer, "<STMTTRN>")?;
            writeln!(writer, "<TRNTYPE>{}", transaction.kind().as_ofx())?;
            writeln!(writer, "<DTPOSTED>{}", format_ofx_date(&transaction.date))?;
            writeln!(writer, "<TRNAMT>{}", format_amount(&transaction.amount))?;
            writeln!(writer, "<FITID>{}", fitid(transaction, position))?;
            writeln!(writer, "<NAME>{}", escape_sgml(&transaction.description))?;
            writeln!(writer, "</STMTTRN>")?;
        }

        writeln!(writer, "</BANKTRANLIST>")?;

        writeln!(writer, "<LEDGERBAL>")?;
        writeln!(writer, "<BALAMT>{}", format_amount(&self.config.ledger_balance))?;
        writeln!(writer, "<DTASOF>{}", format_ofx_date(&end))?;
        writeln!(writer, "</LEDGERBAL>")?;

        writeln!(writer, "</STMTRS>")?;
        writeln!(writer, "</STMTTRNRS>")?;
        writeln!(writer, "</BANKMSGSRSV1>")?;
        writeln!(writer, "</OFX>")?;

        Ok(())
    }
}

/// Format a date as the 8-digit `YYYYMMDD` the format mandates.
fn format_ofx_date(date: &NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Format an amount with exactly two fractional digits.
fn format_amount(amount: &Decimal) -> String {
    format!("{:.2}", amount)
}

/// Escape the three reserved markup characters for SGML element content.
fn escape_sgml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Generate the per-record unique identifier: date, two-decimal amount,
/// sanitized description and the record's 0-based position in the sorted
/// sequence, capped at the format's 255-character field limit.
fn fitid(transaction: &Transaction, position: usize) -> String {
    let sanitized: String = transaction
        .description
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(FITID_DESC_LEN)
        .collect();

    let mut id = format!(
        "{}{}{}{}",
        transaction.date.format("%Y%m%d"),
        format_amount(&transaction.amount),
        sanitized,
        position
    );
    id.truncate(FITID_MAX_LEN);
    id
}
