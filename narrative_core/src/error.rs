//! Error types for the flavor pipeline.
//!
//! None of these ever reach the host. The interceptor logs them and the only
//! visible effect is a missing notification.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single generation attempt.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request never produced a response (connection refused, reset, DNS).
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// No response arrived before the deadline.
    #[error("generation timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The response body did not contain a usable message.
    #[error("could not decode backend response: {reason}")]
    Decode { reason: String },

    /// The HTTP client could not be built or the request could not be encoded.
    #[error("client error: {reason}")]
    Client { reason: String },
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Failure while preparing an event for generation.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// Participant data could not be resolved from the entry.
    #[error("cannot extract interaction: {reason}")]
    Extraction { reason: String },
}

/// Failure loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {reason}")]
    Parse { reason: String },

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type SettingsResult<T> = Result<T, SettingsError>;
