//! Flavor settings - what the settings UI edits and the pipeline reads.
//!
//! The live value sits in a [`SettingsStore`]. Every event works from one
//! immutable snapshot taken when it is intercepted, so an edit made while a
//! request is in flight never mixes old and new values.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{SettingsError, SettingsResult};
use crate::prompt::PromptLimits;

/// Path of the generation endpoint below the base URL.
pub const GENERATE_PATH: &str = "/api/generate";

const DEFAULT_SYSTEM_PROMPT: &str = "You narrate a colony simulation. Given an interaction \
between two colonists, reply with one short sentence describing how the recipient reacts. \
Reply with the sentence only.";

/// Configuration of the flavor text pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlavorSettings {
    /// Master switch. When false, intercepted events are ignored.
    pub enabled: bool,

    /// Model identifier passed to the backend.
    pub model: String,

    /// Base URL of the generation backend.
    pub endpoint: String,

    /// Sampling temperature, nominally 0.0-2.0.
    pub temperature: f32,

    /// System instruction sent with every request.
    pub system_prompt: String,

    /// Deadline for a single generation attempt.
    pub request_timeout_secs: u64,

    pub prompt: PromptLimits,

    pub dedup: DedupSettings,
}

impl Default for FlavorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "llama3.2".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout_secs: 30,
            prompt: PromptLimits::default(),
            dedup: DedupSettings::default(),
        }
    }
}

/// Bounds of the processed-event set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Maximum number of remembered event identities.
    pub capacity: usize,

    /// How long an identity is remembered.
    pub ttl_secs: u64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            capacity: 4096,
            ttl_secs: 600,
        }
    }
}

impl DedupSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl FlavorSettings {
    /// Parse settings from TOML. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> SettingsResult<Self> {
        let settings: Self = toml::from_str(contents).map_err(|e| SettingsError::Parse {
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&contents)?;

        tracing::info!(path = %path.display(), "loaded flavor settings");
        Ok(settings)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.model.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "model",
                reason: "must not be empty".to_string(),
            });
        }

        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(SettingsError::Invalid {
                field: "endpoint",
                reason: format!("'{}' is not an http(s) URL", self.endpoint),
            });
        }

        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(SettingsError::Invalid {
                field: "temperature",
                reason: format!("{} is outside 0.0-2.0", self.temperature),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.dedup.capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "dedup.capacity",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Full URL of the generation endpoint.
    pub fn generate_url(&self) -> String {
        format!("{}{}", self.endpoint.trim().trim_end_matches('/'), GENERATE_PATH)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Live settings shared between the settings UI and the pipeline.
#[derive(Debug, Default)]
pub struct SettingsStore {
    current: RwLock<Arc<FlavorSettings>>,
}

impl SettingsStore {
    pub fn new(settings: FlavorSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Immutable copy of the current settings.
    pub fn snapshot(&self) -> Arc<FlavorSettings> {
        self.current.read().clone()
    }

    /// Swap in a whole new configuration.
    pub fn replace(&self, settings: FlavorSettings) {
        *self.current.write() = Arc::new(settings);
    }

    /// Edit the live configuration. Outstanding snapshots are unaffected.
    pub fn update(&self, edit: impl FnOnce(&mut FlavorSettings)) {
        let mut current = self.current.write();
        let mut next = (**current).clone();
        edit(&mut next);
        *current = Arc::new(next);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.update(|s| s.enabled = enabled);
    }
}
