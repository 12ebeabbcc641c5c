//! The message surface - short notifications shown to the player.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MessageSeverity {
    #[default]
    Neutral,
    Positive,
    Negative,
    Threat,
}

/// A notification for the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub severity: MessageSeverity,
}

impl Message {
    pub fn new(text: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }

    /// A neutral-severity notification.
    pub fn neutral(text: impl Into<String>) -> Self {
        Self::new(text, MessageSeverity::Neutral)
    }
}

/// Receives notifications. Posting never blocks and never fails.
pub trait MessageSink: Send + Sync {
    fn post(&self, message: Message);
}

/// In-memory message surface, safe to post to from any thread.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every message posted so far, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Remove and return all messages.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl MessageSink for MessageLog {
    fn post(&self, message: Message) {
        self.messages.lock().push(message);
    }
}
