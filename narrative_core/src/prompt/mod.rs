//! Prompt Builder - turns an interaction into prompt text for the backend.
//!
//! Building is pure and deterministic: the same agents, traits, opinion and
//! text always give byte-identical output. The prompt is laid out as:
//! 1. **Interaction**: the original log text
//! 2. **Participants**: both names with their trait lists
//! 3. **Relationship**: polarity label and raw opinion score
//! 4. **Task**: what the backend should write

use serde::{Deserialize, Serialize};
use sim_world::Agent;

/// Size bounds applied while building a prompt. Zero means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptLimits {
    /// Maximum traits listed per participant.
    pub max_traits: usize,

    /// Maximum characters of original event text.
    pub max_event_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_traits: 8,
            max_event_chars: 400,
        }
    }
}

/// Coarse polarity of the initiator's opinion of the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    Positive,
    Negative,
}

impl Relationship {
    /// Strictly positive opinions are `Positive`; zero counts as `Negative`.
    pub fn from_opinion(opinion: i32) -> Self {
        if opinion > 0 {
            Relationship::Positive
        } else {
            Relationship::Negative
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relationship::Positive => f.write_str("Positive"),
            Relationship::Negative => f.write_str("Negative"),
        }
    }
}

/// Builds prompts from interaction participants.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    limits: PromptLimits,
}

impl PromptBuilder {
    /// Create a prompt builder with the given limits.
    pub fn new(limits: PromptLimits) -> Self {
        Self { limits }
    }

    /// Build the prompt text for an interaction.
    pub fn build_prompt(&self, initiator: &Agent, recipient: &Agent, original_text: &str) -> String {
        self.assemble(initiator, recipient, original_text)
            .to_prompt_string()
    }

    /// Collect the bounded context for an interaction.
    pub fn assemble(
        &self,
        initiator: &Agent,
        recipient: &Agent,
        original_text: &str,
    ) -> InteractionContext {
        let opinion = initiator.opinion_of(recipient.id);

        InteractionContext {
            event_text: truncate_chars(original_text, self.limits.max_event_chars),
            initiator: self.participant(initiator),
            recipient: self.participant(recipient),
            relationship: Relationship::from_opinion(opinion),
            opinion,
        }
    }

    fn participant(&self, agent: &Agent) -> ParticipantContext {
        let traits = match self.limits.max_traits {
            0 => agent.traits.clone(),
            max => agent.traits.iter().take(max).cloned().collect(),
        };
        ParticipantContext {
            name: agent.name.clone(),
            traits,
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Everything the prompt says about one interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionContext {
    /// Original log text, markup already stripped.
    pub event_text: String,
    pub initiator: ParticipantContext,
    pub recipient: ParticipantContext,
    pub relationship: Relationship,
    /// Initiator's opinion of the recipient.
    pub opinion: i32,
}

/// Name and traits of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantContext {
    pub name: String,
    pub traits: Vec<String>,
}

impl ParticipantContext {
    fn trait_list(&self) -> String {
        if self.traits.is_empty() {
            "none".to_string()
        } else {
            self.traits.join(", ")
        }
    }
}

impl InteractionContext {
    /// Format the context as a prompt string.
    pub fn to_prompt_string(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Interaction\n");
        prompt.push_str(&self.event_text);
        prompt.push_str("\n\n");

        prompt.push_str("## Participants\n");
        prompt.push_str(&format!(
            "- {} (initiator). Traits: {}\n",
            self.initiator.name,
            self.initiator.trait_list()
        ));
        prompt.push_str(&format!(
            "- {} (recipient). Traits: {}\n",
            self.recipient.name,
            self.recipient.trait_list()
        ));
        prompt.push('\n');

        prompt.push_str("## Relationship\n");
        prompt.push_str(&format!(
            "{} feels {} ({} opinion) toward {}.\n\n",
            self.initiator.name, self.relationship, self.opinion, self.recipient.name
        ));

        prompt.push_str("## Task\n");
        prompt.push_str(&format!(
            "In one short sentence, describe how {} reacts.\n",
            self.recipient.name
        ));

        prompt
    }
}
