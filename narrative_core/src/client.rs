//! Generation client - one outbound request per call, no retries.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::codec::{self, GenerationRequest, GenerationResponse};
use crate::error::{GenerationError, GenerationResult};
use crate::settings::FlavorSettings;

/// Longest slice of an error body kept in [`GenerationError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

/// Something that turns a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Make exactly one generation attempt using the given settings snapshot.
    async fn generate(&self, settings: &FlavorSettings, prompt: &str) -> GenerationResult<String>;
}

/// Client for an Ollama-style `/api/generate` backend.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
}

impl OllamaClient {
    /// Create a client with its own connection pool.
    pub fn new() -> GenerationResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("narrative_core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationError::Client {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { http })
    }

    /// Create a client on top of a shared HTTP client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    #[instrument(skip_all, fields(model = %settings.model))]
    async fn generate(&self, settings: &FlavorSettings, prompt: &str) -> GenerationResult<String> {
        let request = GenerationRequest::new(settings, prompt);
        let body = codec::encode(&request)?;
        let url = settings.generate_url();
        let timeout = settings.request_timeout();

        debug!(url = %url, prompt_chars = prompt.len(), "sending generation request");

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        if !status.is_success() {
            let body: String = String::from_utf8_lossy(&bytes)
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response = GenerationResponse::from_body(&bytes);
        debug!(body_bytes = response.raw.len(), decoded = response.message.is_some(), "received generation response");

        response.message.ok_or_else(|| GenerationError::Decode {
            reason: format!("no usable 'response' field in {} byte body", response.raw.len()),
        })
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }
    } else {
        GenerationError::Transport {
            reason: err.to_string(),
        }
    }
}
