//! Simulation mechanics: the catalogue of social interactions.

use serde::{Deserialize, Serialize};

/// Social interactions two agents can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    // Small talk
    Chitchat,
    DeepTalk,

    // Friendly
    KindWords,
    BuildRapport,
    Reassure,

    // Hostile
    Slight,
    Insult,

    // Romance
    RomanceAttempt,
    MarriageProposal,
    Breakup,
}

impl InteractionKind {
    /// Human-readable label shown in the play log.
    pub fn label(&self) -> &'static str {
        match self {
            InteractionKind::Chitchat => "chitchat",
            InteractionKind::DeepTalk => "deep talk",
            InteractionKind::KindWords => "kind words",
            InteractionKind::BuildRapport => "build rapport",
            InteractionKind::Reassure => "reassure",
            InteractionKind::Slight => "slight",
            InteractionKind::Insult => "insult",
            InteractionKind::RomanceAttempt => "romance attempt",
            InteractionKind::MarriageProposal => "marriage proposal",
            InteractionKind::Breakup => "breakup",
        }
    }

    /// Whether the interaction is meant to hurt the recipient.
    pub fn is_hostile(&self) -> bool {
        matches!(self, InteractionKind::Slight | InteractionKind::Insult)
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
