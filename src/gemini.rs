//! Gemini-backed extraction capability.
//!
//! Thin adapter over the `generateContent` REST endpoint. Retrying is the
//! extraction client's job; this module only surfaces provider failures,
//! embedding the HTTP status in the message so throttling responses
//! classify as transient upstream.

use crate::error::{Error, Result};
use crate::extraction::{CallOptions, CapabilityError, ExtractionCapability};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Extraction capability backed by the Gemini `generateContent` API.
pub struct GeminiCapability {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiCapability {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a capability from `GEMINI_API_KEY` or `GOOGLE_AI_API_KEY`.
    pub fn from_env(model: Option<String>) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_AI_API_KEY"))
            .map_err(|_| {
                Error::MissingApiKey("set GEMINI_API_KEY or GOOGLE_AI_API_KEY".to_string())
            })?;

        Ok(Self::new(
            api_key,
            model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        ))
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: &'a Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ExtractionCapability for GeminiCapability {
    async fn call(
        &self,
        prompt: &str,
        schema: &Value,
        options: &CallOptions,
    ) -> std::result::Result<String, CapabilityError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::new(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::new(format!("HTTP {status}: {text}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::new(format!("invalid response body: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .flat_map(|candidate| candidate.content.parts)
            .map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(CapabilityError::new("response contained no text candidates"));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_uses_the_wire_field_names() {
        let schema = serde_json::json!({"type": "object"});
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "prompt" }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 8192,
                response_mime_type: "application/json",
                response_schema: &schema,
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "object");
    }

    #[test]
    fn test_response_text_is_concatenated_across_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"transactions\""}, {"text": ": []}"}]}}]}"#,
        )
        .unwrap();

        let text: String = parsed
            .candidates
            .into_iter()
            .flat_map(|candidate| candidate.content.parts)
            .map(|part| part.text)
            .collect();

        assert_eq!(text, r#"{"transactions": []}"#);
    }
}
