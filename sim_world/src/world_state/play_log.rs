//! Play log entries - the records the simulation emits as things happen.

use serde::{Deserialize, Serialize};

use crate::entities::{AgentId, EventId};
use crate::mechanics::InteractionKind;

/// A single recorded entry. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayLogEntry {
    pub id: EventId,
    /// Simulation tick the entry was recorded at.
    pub tick: u64,
    pub body: EntryBody,
}

/// What an entry records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntryBody {
    /// Two agents interacted socially.
    Interaction {
        kind: InteractionKind,
        /// None when the initiator is gone (despawned, destroyed).
        initiator: Option<AgentId>,
        recipient: Option<AgentId>,
        /// Rendered text, may carry rich-text markup.
        text: String,
    },

    /// A combat exchange.
    Combat {
        attacker: Option<AgentId>,
        target: Option<AgentId>,
        text: String,
    },

    /// Free-form note from some other subsystem.
    Note { text: String },
}

impl PlayLogEntry {
    pub fn new(tick: u64, body: EntryBody) -> Self {
        Self {
            id: EventId::new(),
            tick,
            body,
        }
    }

    /// Check if this entry records a social interaction.
    pub fn is_interaction(&self) -> bool {
        matches!(self.body, EntryBody::Interaction { .. })
    }

    /// The interaction kind, if this entry records one.
    pub fn interaction_kind(&self) -> Option<InteractionKind> {
        match &self.body {
            EntryBody::Interaction { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Initiator and recipient of the entry, as far as they are known.
    pub fn participants(&self) -> (Option<AgentId>, Option<AgentId>) {
        match &self.body {
            EntryBody::Interaction {
                initiator,
                recipient,
                ..
            } => (*initiator, *recipient),
            EntryBody::Combat {
                attacker, target, ..
            } => (*attacker, *target),
            EntryBody::Note { .. } => (None, None),
        }
    }

    /// The rendered text of the entry, markup included.
    pub fn rendered_text(&self) -> &str {
        match &self.body {
            EntryBody::Interaction { text, .. }
            | EntryBody::Combat { text, .. }
            | EntryBody::Note { text } => text,
        }
    }
}
