//! Statement-to-OFX Converter Library
//!
//! A library for turning unstructured financial statement text into OFX
//! 1.02 documents using an external structured-extraction capability.
//!
//! # Pipeline
//!
//! 1. Oversized input is split into line-aligned chunks
//! 2. Each chunk is sent to the extraction capability, with bounded
//!    retries and exponential backoff for rate-limited calls
//! 3. Extracted records are validated and normalized; malformed records
//!    are dropped, not fatal
//! 4. The aggregated transactions are sorted and serialized into a fixed
//!    OFX document
//!
//! Input already in OFX format is passed through untouched. The capability
//! is an injected [`ExtractionCapability`] so any provider (or a test stub)
//! can sit behind the pipeline; [`GeminiCapability`] is the bundled
//! implementation.
//!
//! # Examples
//!
//! ## Converting a statement
//!
//! ```no_run
//! use ofx_converter::{GeminiCapability, StatementConverter};
//!
//! # async fn demo() -> ofx_converter::Result<()> {
//! let capability = GeminiCapability::from_env(None)?;
//! let mut converter = StatementConverter::new(capability);
//!
//! let ofx = converter
//!     .convert("2024-03-05  Coffee  -4.50", "statement.txt", |msg| {
//!         eprintln!("{msg}");
//!     })
//!     .await?;
//! println!("{ofx}");
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod error;
pub mod extraction;
pub mod gemini;
pub mod normalize;
pub mod ofx_format;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use extraction::{
    CallOptions, CapabilityError, ExtractionCapability, ExtractionClient, RetryPolicy,
};
pub use gemini::GeminiCapability;
pub use ofx_format::{OfxConfig, OfxDocument, OFX_HEADER_MARKER};
pub use pipeline::{ChunkingConfig, ConverterConfig, StatementConverter};
pub use types::{Chunk, ConversionStatus, RawRecord, Transaction, TransactionKind};
