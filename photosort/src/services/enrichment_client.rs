//! Image description enrichment client
//!
//! Derives a file label from image content by asking an external
//! vision-language service to describe the image. Every network attempt
//! passes through the shared [`RateGate`]; transient failures (timeouts,
//! 408/429/5xx) retry with exponential backoff, a 400 fails immediately.
//!
//! Response parsing is tolerant of shape variation: the description may be
//! a direct `output.text` field or nested inside `output.choices[]`
//! message content. Extracted text is sanitized into a filesystem-safe
//! label before use.
//!
//! All failures are reported through [`EnrichmentResult`]; this client
//! never returns an `Err` past its boundary.

use crate::services::file_scanner::is_image_extension;
use crate::services::rate_gate::RateGate;
use base64::Engine;
use photosort_common::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("photosort/", env!("CARGO_PKG_VERSION"));
const DESCRIBE_PROMPT: &str =
    "Describe the main subject of this photo in a few words, suitable for use as a file name.";

/// Payloads above this are skipped without calling the network
pub const MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;

/// Outcome of one description request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentResult {
    /// Sanitized label derived from the service's description
    Described(String),
    /// Precondition failed; the network was never called
    Skipped(String),
    /// Network, API, or parsing failure after exhausting the retry budget
    Failed,
}

/// Enrichment client configuration
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Description service endpoint
    pub endpoint: String,
    /// Bearer token for the service
    pub api_key: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Retry budget beyond the first attempt
    pub max_retries: u32,
    /// Base factor for exponential backoff, in seconds
    pub backoff_factor: f64,
    /// Outbound request budget
    pub requests_per_second: f64,
    /// Payload size ceiling in bytes
    pub max_image_bytes: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint:
                "https://dashscope.aliyuncs.com/api/v1/services/aigc/multimodal-generation/generation"
                    .to_string(),
            api_key: String::new(),
            model: "qwen-vl-plus".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff_factor: 1.5,
            requests_per_second: 1.0,
            max_image_bytes: MAX_IMAGE_BYTES,
        }
    }
}

/// How one transport attempt ended
enum AttemptError {
    /// Worth retrying under the remaining budget
    Retryable(String),
    /// Retrying cannot help
    Terminal(String),
}

/// Rate-limited description service client
pub struct EnrichmentClient {
    http_client: reqwest::Client,
    rate_gate: Arc<RateGate>,
    config: EnrichmentConfig,
}

impl EnrichmentClient {
    pub fn new(config: EnrichmentConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let rate_gate = Arc::new(RateGate::from_rps(config.requests_per_second));
        Ok(Self {
            http_client,
            rate_gate,
            config,
        })
    }

    /// Client sharing an existing rate gate with other callers
    pub fn with_rate_gate(config: EnrichmentConfig, rate_gate: Arc<RateGate>) -> Result<Self> {
        let mut client = Self::new(config)?;
        client.rate_gate = rate_gate;
        Ok(client)
    }

    /// Derive a sanitized label from image content
    ///
    /// **Algorithm:**
    /// 1. Precondition: empty or oversized payloads are `Skipped` with no
    ///    network call
    /// 2. Up to `max_retries + 1` attempts, each behind `RateGate::acquire`;
    ///    backoff `backoff_factor ^ attempt_index` seconds between attempts
    /// 3. 2xx stops; 400 fails immediately; 408/429/5xx and transport
    ///    errors retry under the remaining budget
    /// 4. Extracted text is sanitized; unusable text is `Failed`
    pub async fn describe(&self, image_bytes: &[u8]) -> EnrichmentResult {
        let content_size = image_bytes.len() as u64;
        if content_size == 0 {
            return EnrichmentResult::Skipped("empty image payload".to_string());
        }
        if content_size > self.config.max_image_bytes {
            return EnrichmentResult::Skipped(format!(
                "payload of {} bytes exceeds {} byte ceiling",
                content_size, self.config.max_image_bytes
            ));
        }

        let payload = base64::engine::general_purpose::STANDARD.encode(image_bytes);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let sleep = self.backoff_delay(attempt - 1);
                tracing::debug!(attempt, sleep_secs = sleep.as_secs_f64(), "Backing off before retry");
                tokio::time::sleep(sleep).await;
            }

            self.rate_gate.acquire().await;

            match self.attempt(&payload).await {
                Ok(text) => {
                    let label = sanitize_label(&text);
                    if label.is_empty() {
                        tracing::warn!(text = %text, "Description sanitized to nothing");
                        return EnrichmentResult::Failed;
                    }
                    tracing::info!(label = %label, attempts = attempt + 1, "Image described");
                    return EnrichmentResult::Described(label);
                }
                Err(AttemptError::Terminal(reason)) => {
                    tracing::warn!(attempt = attempt + 1, reason = %reason, "Enrichment failed, not retrying");
                    return EnrichmentResult::Failed;
                }
                Err(AttemptError::Retryable(reason)) => {
                    tracing::warn!(attempt = attempt + 1, reason = %reason, "Enrichment attempt failed");
                }
            }
        }

        tracing::warn!(
            attempts = self.config.max_retries + 1,
            "Enrichment failed after exhausting retries"
        );
        EnrichmentResult::Failed
    }

    /// Backoff before the attempt following failed attempt `attempt_index`
    fn backoff_delay(&self, attempt_index: u32) -> Duration {
        Duration::from_secs_f64(self.config.backoff_factor.powi(attempt_index as i32))
    }

    /// One transport attempt: send, classify status, extract text
    async fn attempt(&self, payload_b64: &str) -> std::result::Result<String, AttemptError> {
        let body = json!({
            "model": self.config.model,
            "input": {
                "messages": [{
                    "role": "user",
                    "content": [
                        { "image": format!("data:image/jpeg;base64,{}", payload_b64) },
                        { "text": DESCRIBE_PROMPT },
                    ],
                }],
            },
        });

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(format!("network error: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let value: Value = response
                .json()
                .await
                .map_err(|e| AttemptError::Terminal(format!("invalid JSON response: {}", e)))?;
            return extract_description(&value)
                .ok_or_else(|| AttemptError::Terminal("no description text in response".to_string()));
        }

        if status.as_u16() == 400 {
            let detail = response.text().await.unwrap_or_default();
            return Err(AttemptError::Terminal(format!("API rejected request: {}", detail)));
        }

        if status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error() {
            return Err(AttemptError::Retryable(format!("API status {}", status)));
        }

        Err(AttemptError::Terminal(format!("API status {}", status)))
    }
}

/// Pull description text out of either accepted response shape
///
/// Direct shape: `{"output": {"text": "..."}}`. Alternative shape:
/// `{"output": {"choices": [{"message": {"content": [{"text": "..."}]}}]}}`
/// where the first non-empty fragment wins.
fn extract_description(value: &Value) -> Option<String> {
    if let Some(text) = value["output"]["text"].as_str() {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }

    for choice in value["output"]["choices"].as_array()? {
        if let Some(fragments) = choice["message"]["content"].as_array() {
            for fragment in fragments {
                if let Some(text) = fragment["text"].as_str() {
                    if !text.trim().is_empty() {
                        return Some(text.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Turn raw description text into a filesystem-safe label
///
/// Strips characters illegal in file names, drops a trailing media-file
/// extension, collapses whitespace runs and repeated underscores to a
/// single underscore, and trims leading/trailing underscores.
pub fn sanitize_label(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') && !c.is_control())
        .collect();

    let cleaned = strip_media_extension(cleaned.trim());

    let mut label = String::with_capacity(cleaned.len());
    let mut last_was_underscore = false;
    for c in cleaned.chars() {
        if c.is_whitespace() || c == '_' {
            if !last_was_underscore {
                label.push('_');
                last_was_underscore = true;
            }
        } else {
            label.push(c);
            last_was_underscore = false;
        }
    }

    label.trim_matches('_').to_string()
}

/// Drop a trailing `.jpg`-style media extension, case-insensitively
fn strip_media_extension(text: &str) -> &str {
    if let Some(pos) = text.rfind('.') {
        let ext = text[pos + 1..].to_lowercase();
        if is_image_extension(&ext) {
            return &text[..pos];
        }
    }
    text
}
