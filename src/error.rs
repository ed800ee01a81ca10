//! Error types for the ofx-converter library.

use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during extraction and serialization operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The extraction capability reported a rate-limit condition and the
    /// retry budget is exhausted.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The extraction capability failed with a non-retryable error.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The capability response contained no parseable JSON object.
    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),

    /// A chunk failed after its extraction fully resolved; carries the
    /// 1-based position of the failing chunk.
    #[error("part {index} failed: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// A fully successful run produced zero transactions.
    #[error("no transactions found in the statement")]
    EmptyResult,

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid amount format.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// No API key available for the extraction capability.
    #[error("missing API key: {0}")]
    MissingApiKey(String),
}
