//! # Narrative Core (The Cortex)
//!
//! Adds generated flavor text to agent interactions. The core watches the
//! play log, and for every new interaction asks a text-generation backend for
//! a one-line reaction, which it posts to the message surface. The original
//! log entry is never touched.
//!
//! ## Core Components
//!
//! - **interceptor**: Entry point; filters, deduplicates and dispatches events
//! - **prompt**: Builds a bounded prompt from participants and event text
//! - **client**: Issues the generation request to the backend
//! - **codec**: Request encoding and defensive response decoding
//! - **sanitizer**: Cleans generated text for display
//! - **settings**: Configuration and live settings snapshots
//!
//! ## Design Philosophy
//!
//! - **Additive**: The core only adds notifications, it never edits or delays the log
//! - **At most once**: Each entry identity triggers at most one generation
//! - **Quiet failure**: Errors are logged; the host only sees a missing notification

pub mod client;
pub mod codec;
pub mod error;
pub mod interceptor;
pub mod prompt;
pub mod sanitizer;
pub mod settings;

pub use client::*;
pub use codec::{GenerationRequest, GenerationResponse};
pub use error::*;
pub use interceptor::*;
pub use prompt::*;
pub use sanitizer::{sanitize, strip_markup};
pub use settings::*;
