//! Wire format of the generation backend.
//!
//! Requests are a single JSON object:
//! `{"model", "prompt", "temperature", "stream": false, "system"}`.
//! A successful response carries the generated text under `response`
//! followed by a `done` flag. The body comes from a loosely specified
//! service, so decoding never fails loudly: anything unusable becomes `None`.

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{GenerationError, GenerationResult};
use crate::settings::FlavorSettings;

/// One request to the backend. Built fresh for every attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(serialize_with = "serialize_one_decimal")]
    pub temperature: f32,
    pub stream: bool,
    pub system: String,
}

impl GenerationRequest {
    /// Build a request from a settings snapshot and a finished prompt.
    pub fn new(settings: &FlavorSettings, prompt: impl Into<String>) -> Self {
        Self {
            model: settings.model.clone(),
            prompt: prompt.into(),
            temperature: settings.temperature,
            stream: false,
            system: settings.system_prompt.clone(),
        }
    }
}

/// Temperature goes over the wire rounded to one decimal place.
fn serialize_one_decimal<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    let rounded = (f64::from(*value) * 10.0).round() / 10.0;
    serializer.serialize_f64(rounded)
}

/// Raw backend payload plus the message extracted from it.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub raw: String,
    pub message: Option<String>,
}

impl GenerationResponse {
    pub fn from_body(body: &[u8]) -> Self {
        Self {
            raw: String::from_utf8_lossy(body).into_owned(),
            message: decode(body),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    done: Option<bool>,
}

/// Serialize a request body. String fields are escaped by the JSON encoder.
pub fn encode(request: &GenerationRequest) -> GenerationResult<Vec<u8>> {
    serde_json::to_vec(request).map_err(|e| GenerationError::Client {
        reason: format!("failed to encode request: {}", e),
    })
}

/// Extract the generated message from a response body.
///
/// Accepts a single JSON object, or line-delimited objects whose `response`
/// fragments are concatenated. Returns `None` for anything without a
/// non-empty message.
pub fn decode(body: &[u8]) -> Option<String> {
    let text = match serde_json::from_slice::<WireResponse>(body) {
        Ok(wire) => wire.response?,
        Err(_) => decode_lines(body)?,
    };
    unwrap_message(&text)
}

fn decode_lines(body: &[u8]) -> Option<String> {
    let body = String::from_utf8_lossy(body);
    let mut fragments = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<WireResponse>(line).ok())
        .filter_map(|wire| wire.response)
        .peekable();

    fragments.peek()?;
    Some(fragments.collect())
}

/// Trim the message and drop one layer of surrounding quotes.
///
/// Quotes are only removed when they wrap the whole message. Text such as
/// `"Thanks," Bob says, "really."` opens and closes with a quote but holds
/// two quoted phrases, so it is kept as written.
fn unwrap_message(text: &str) -> Option<String> {
    const QUOTES: [(char, char); 2] = [('"', '"'), ('\u{201C}', '\u{201D}')];

    let mut message = text.trim();
    for (open, close) in QUOTES {
        if message.len() >= open.len_utf8() + close.len_utf8()
            && message.starts_with(open)
            && message.ends_with(close)
        {
            let inner = &message[open.len_utf8()..message.len() - close.len_utf8()];
            if !inner.contains(open) && !inner.contains(close) {
                message = inner.trim();
            }
            break;
        }
    }

    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}
