//! Conversion pipeline orchestrator.
//!
//! Sequences chunking, per-chunk extraction and serialization for one
//! statement at a time. Chunks are processed strictly in order; the next
//! chunk's request is only issued once the previous one has fully resolved,
//! retries included. Any chunk failure aborts the whole run.

use crate::chunker;
use crate::error::{Error, Result};
use crate::extraction::{ExtractionCapability, ExtractionClient, RetryPolicy};
use crate::normalize::normalize;
use crate::ofx_format::{OfxConfig, OfxDocument, OFX_HEADER_MARKER};
use crate::types::{Chunk, ConversionStatus, Transaction};
use std::time::Duration;

/// Tuning knobs for a conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConverterConfig {
    pub chunking: ChunkingConfig,
    pub retry: RetryPolicy,
    pub ofx: OfxConfig,
}

/// Chunk sizing and progress pacing.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Soft upper bound on chunk size, kept well under the extraction
    /// capability's input budget.
    pub max_chunk_size: usize,
    /// Pause around multi-chunk progress messages so a human observer can
    /// read them before processing continues.
    pub multi_chunk_pause: Duration,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 150_000,
            multi_chunk_pause: Duration::from_millis(1500),
        }
    }
}

/// Orchestrates one statement conversion at a time.
///
/// Owns its chunk sequence and accumulator exclusively; there is no state
/// shared across runs and no cancellation. A new call simply starts a fresh
/// run, resetting the status straight to `Processing`.
pub struct StatementConverter<C> {
    client: ExtractionClient<C>,
    config: ConverterConfig,
    status: ConversionStatus,
}

impl<C: ExtractionCapability> StatementConverter<C> {
    pub fn new(capability: C) -> Self {
        Self::with_config(capability, ConverterConfig::default())
    }

    pub fn with_config(capability: C, config: ConverterConfig) -> Self {
        let client = ExtractionClient::new(capability).with_retry_policy(config.retry.clone());
        Self {
            client,
            config,
            status: ConversionStatus::Idle,
        }
    }

    /// Externally observable state of the current or most recent run.
    pub fn status(&self) -> ConversionStatus {
        self.status
    }

    /// Convert raw statement text into a complete OFX document.
    ///
    /// Input that already carries the OFX header marker is returned
    /// verbatim without touching the extraction capability.
    pub async fn convert(
        &mut self,
        raw_text: &str,
        file_name: &str,
        mut on_progress: impl FnMut(&str),
    ) -> Result<String> {
        self.status = ConversionStatus::Processing;

        if raw_text.trim_start().starts_with(OFX_HEADER_MARKER) {
            tracing::debug!("{file_name}: input is already OFX, passing through");
            on_progress("File is already in OFX format.");
            self.status = ConversionStatus::Success;
            return Ok(raw_text.to_string());
        }

        let result = self.convert_inner(raw_text, file_name, &mut on_progress).await;
        self.status = match result {
            Ok(_) => ConversionStatus::Success,
            Err(_) => ConversionStatus::Error,
        };
        result
    }

    /// Run chunking and extraction, returning the aggregated transactions
    /// in the order chunks produced them. Sorting happens at serialization.
    pub async fn extract_transactions(
        &mut self,
        raw_text: &str,
        file_name: &str,
        mut on_progress: impl FnMut(&str),
    ) -> Result<Vec<Transaction>> {
        self.status = ConversionStatus::Processing;

        let result = self.extract_inner(raw_text, file_name, &mut on_progress).await;
        self.status = match result {
            Ok(_) => ConversionStatus::Success,
            Err(_) => ConversionStatus::Error,
        };
        result
    }

    async fn convert_inner(
        &self,
        raw_text: &str,
        file_name: &str,
        on_progress: &mut impl FnMut(&str),
    ) -> Result<String> {
        let transactions = self.extract_inner(raw_text, file_name, on_progress).await?;
        on_progress("Finalizing...");
        OfxDocument::with_config(transactions, self.config.ofx.clone()).render()
    }

    async fn extract_inner(
        &self,
        raw_text: &str,
        file_name: &str,
        on_progress: &mut impl FnMut(&str),
    ) -> Result<Vec<Transaction>> {
        let pieces = chunker::chunk(raw_text, self.config.chunking.max_chunk_size);
        let total = pieces.len();

        if total > 1 {
            on_progress(&format!("Large file split into {total} parts for processing."));
            tokio::time::sleep(self.config.chunking.multi_chunk_pause).await;
        }

        let mut transactions: Vec<Transaction> = Vec::new();

        for (i, text) in pieces.into_iter().enumerate() {
            let chunk = Chunk {
                text,
                index: i + 1,
                total,
            };
            on_progress(&format!("Processing part {} of {}...", chunk.index, total));

            let records = self
                .client
                .extract(&chunk, file_name, &mut *on_progress)
                .await
                .map_err(|e| Error::Chunk {
                    index: chunk.index,
                    source: Box::new(e),
                })?;

            let kept_before = transactions.len();
            transactions.extend(records.iter().filter_map(normalize));
            tracing::debug!(
                "{file_name}: part {} produced {} records, kept {}",
                chunk.index,
                records.len(),
                transactions.len() - kept_before
            );

            if total > 1 {
                on_progress("...done.");
                tokio::time::sleep(self.config.chunking.multi_chunk_pause).await;
            }
        }

        if transactions.is_empty() {
            return Err(Error::EmptyResult);
        }

        Ok(transactions)
    }
}
