//! Extraction client for the external structured-extraction capability.
//!
//! The capability itself is an injected [`ExtractionCapability`]; this
//! module owns the prompt and response contract, classifies failures, and
//! retries rate-limited calls with exponential backoff.

use crate::error::{Error, Result};
use crate::types::{Chunk, RawRecord};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Message fragments that identify a transient rate-limit/throttling
/// failure, matched case-insensitively against the capability's error text.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "429",
    "too many requests",
    "quota",
    "resource exhausted",
    "overloaded",
];

/// Options forwarded to the extraction capability for a single call.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Sampling temperature; zero for deterministic output.
    pub temperature: f32,
    /// Upper bound on the generated output size.
    pub max_output_tokens: u32,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_output_tokens: 8192,
        }
    }
}

/// Failure reported by an extraction capability.
///
/// Implementations only surface what the provider said; classification
/// into transient and permanent failures happens in the client by
/// inspecting the message.
#[derive(Debug, Clone)]
pub struct CapabilityError {
    pub message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CapabilityError {}

/// An external structured-extraction service that turns free text into
/// structured transaction candidates.
#[async_trait]
pub trait ExtractionCapability: Send + Sync {
    /// Submit a prompt with a response schema; returns the raw response
    /// text, which may wrap the mandated JSON object in prose.
    async fn call(
        &self,
        prompt: &str,
        schema: &Value,
        options: &CallOptions,
    ) -> std::result::Result<String, CapabilityError>;
}

/// Retry budget and backoff timing for capability calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay; doubles after every failed attempt.
    pub initial_backoff: Duration,
    /// Exclusive upper bound of the random jitter added to each wait.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(2000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failed attempt `attempt` (0-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff * 2u32.pow(attempt);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };
        base + Duration::from_millis(jitter)
    }
}

/// Drives the extraction capability for one chunk at a time.
pub struct ExtractionClient<C> {
    capability: C,
    options: CallOptions,
    retry: RetryPolicy,
}

impl<C: ExtractionCapability> ExtractionClient<C> {
    pub fn new(capability: C) -> Self {
        Self {
            capability,
            options: CallOptions::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Extract raw transaction records from one chunk of statement text.
    ///
    /// Rate-limited calls are retried up to the attempt budget with
    /// exponential backoff; a countdown is reported through `on_progress`
    /// before each wait. Any other failure propagates immediately.
    pub async fn extract(
        &self,
        chunk: &Chunk,
        file_name: &str,
        mut on_progress: impl FnMut(&str),
    ) -> Result<Vec<RawRecord>> {
        let prompt = build_prompt(chunk, file_name);
        let schema = response_schema();

        let mut attempt = 0;
        loop {
            match self.capability.call(&prompt, &schema, &self.options).await {
                Ok(text) => return parse_response(&text),
                Err(err) if is_rate_limited(&err.message) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(
                            "part {}: rate limited on final attempt: {}",
                            chunk.index,
                            err.message
                        );
                        return Err(Error::RateLimited(err.message));
                    }

                    let delay = self.retry.backoff_delay(attempt - 1);
                    on_progress(&format!(
                        "Rate limited, retrying in {}s...",
                        delay.as_secs_f64().ceil() as u64
                    ));
                    tracing::debug!(
                        "part {}: attempt {} rate limited, backing off {:?}",
                        chunk.index,
                        attempt,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!("part {}: extraction failed: {}", chunk.index, err.message);
                    return Err(Error::Extraction(err.message));
                }
            }
        }
    }
}

/// Natural-language instruction bundled with the strict output contract.
fn build_prompt(chunk: &Chunk, file_name: &str) -> String {
    let position = if chunk.total > 1 {
        format!(" (part {} of {})", chunk.index, chunk.total)
    } else {
        String::new()
    };

    format!(
        "You are given the raw text of a financial statement extracted from \
         the file \"{file_name}\"{position}. Identify every transaction and \
         return ONLY a JSON object of the form:\n\
         {{\"transactions\": [{{\"date\": \"YYYY-MM-DD\", \"description\": \"...\", \"amount\": -12.34}}]}}\n\
         Amounts must be negative for debits, withdrawals and payments, and \
         positive for credits and deposits. Do not invent transactions; skip \
         summary and balance rows.\n\nStatement text:\n{}",
        chunk.text
    )
}

/// JSON schema for the mandated response shape: an object with a
/// `transactions` array of `{date, description, amount}` records.
fn response_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "transactions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date": { "type": "string" },
                        "description": { "type": "string" },
                        "amount": { "type": "number" }
                    },
                    "required": ["date", "description", "amount"]
                }
            }
        },
        "required": ["transactions"]
    })
}

/// Pull the JSON object out of a capability response, tolerating
/// surrounding prose: everything between the first `{` and the last `}` is
/// parsed. A response with no such boundary is a permanent failure.
///
/// A parsed object without a `transactions` array yields an empty batch so
/// one malformed chunk does not abort a multi-chunk run.
fn parse_response(text: &str) -> Result<Vec<RawRecord>> {
    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(Error::MalformedResponse(
                "no JSON object in response".to_string(),
            ))
        }
    };

    let value: Value = serde_json::from_str(&text[start..=end])
        .map_err(|e| Error::MalformedResponse(e.to_string()))?;

    match value.get("transactions").and_then(Value::as_array) {
        Some(items) => Ok(items
            .iter()
            .map(|item| serde_json::from_value(item.clone()).unwrap_or_default())
            .collect()),
        None => Ok(Vec::new()),
    }
}

fn is_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Capability that replays a scripted sequence of responses.
    struct ScriptedCapability {
        responses: Mutex<VecDeque<std::result::Result<String, CapabilityError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedCapability {
        fn new(
            responses: Vec<std::result::Result<String, CapabilityError>>,
        ) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExtractionCapability for ScriptedCapability {
        async fn call(
            &self,
            _prompt: &str,
            _schema: &Value,
            _options: &CallOptions,
        ) -> std::result::Result<String, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("capability called more times than scripted")
        }
    }

    fn no_delay_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    fn chunk_of(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            index: 1,
            total: 1,
        }
    }

    const OK_BODY: &str =
        r#"{"transactions": [{"date": "2024-03-05", "description": "Coffee", "amount": -4.5}]}"#;

    #[tokio::test]
    async fn test_succeeds_after_two_rate_limit_failures() {
        let client = ExtractionClient::new(ScriptedCapability::new(vec![
            Err(CapabilityError::new("HTTP 429: too many requests")),
            Err(CapabilityError::new("rate limit exceeded")),
            Ok(OK_BODY.to_string()),
        ]))
        .with_retry_policy(no_delay_policy());

        let mut waits = Vec::new();
        let records = client
            .extract(&chunk_of("stmt"), "stmt.txt", |m| waits.push(m.to_string()))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description.as_deref(), Some("Coffee"));
        assert_eq!(client.capability.calls(), 3);
        assert_eq!(waits.len(), 2, "exactly one countdown per backoff wait");
        assert!(waits.iter().all(|m| m.contains("retrying")));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let client = ExtractionClient::new(ScriptedCapability::new(vec![Err(
            CapabilityError::new("invalid request payload"),
        )]))
        .with_retry_policy(no_delay_policy());

        let mut waits = Vec::new();
        let err = client
            .extract(&chunk_of("stmt"), "stmt.txt", |m| waits.push(m.to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Extraction(_)));
        assert_eq!(client.capability.calls(), 1);
        assert!(waits.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_raise_the_last_error() {
        let client = ExtractionClient::new(ScriptedCapability::new(vec![
            Err(CapabilityError::new("429")),
            Err(CapabilityError::new("429")),
            Err(CapabilityError::new("quota exceeded for model")),
        ]))
        .with_retry_policy(no_delay_policy());

        let err = client
            .extract(&chunk_of("stmt"), "stmt.txt", |_| {})
            .await
            .unwrap_err();

        match err {
            Error::RateLimited(message) => assert_eq!(message, "quota exceeded for model"),
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert_eq!(client.capability.calls(), 3);
    }

    #[tokio::test]
    async fn test_json_is_extracted_from_surrounding_prose() {
        let body = format!("Here is the result:\n{OK_BODY}\nLet me know if you need more.");
        let client = ExtractionClient::new(ScriptedCapability::new(vec![Ok(body)]));

        let records = client
            .extract(&chunk_of("stmt"), "stmt.txt", |_| {})
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_transactions_array_yields_empty_batch() {
        let client = ExtractionClient::new(ScriptedCapability::new(vec![Ok(
            r#"{"note": "nothing resembling a statement here"}"#.to_string(),
        )]));

        let records = client
            .extract(&chunk_of("stmt"), "stmt.txt", |_| {})
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_response_without_json_is_a_permanent_failure() {
        let client = ExtractionClient::new(ScriptedCapability::new(vec![Ok(
            "I could not find any transactions.".to_string(),
        )]));

        let err = client
            .extract(&chunk_of("stmt"), "stmt.txt", |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(is_rate_limited("HTTP 429: Too Many Requests"));
        assert!(is_rate_limited("Resource Exhausted: per-minute quota"));
        assert!(is_rate_limited("model is overloaded"));
        assert!(!is_rate_limited("invalid API key"));
        assert!(!is_rate_limited("schema validation failed"));
    }

    #[test]
    fn test_prompt_names_the_file_and_part() {
        let chunk = Chunk {
            text: "txt".to_string(),
            index: 2,
            total: 3,
        };
        let prompt = build_prompt(&chunk, "march.pdf");
        assert!(prompt.contains("march.pdf"));
        assert!(prompt.contains("part 2 of 3"));

        let single = build_prompt(&chunk_of("txt"), "march.pdf");
        assert!(!single.contains("part 1 of 1"));
    }
}
