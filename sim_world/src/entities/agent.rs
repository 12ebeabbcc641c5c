//! Agent definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::AgentId;

/// A simulated character that takes part in interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,

    /// Trait descriptors in display order.
    pub traits: Vec<String>,

    /// Agent ID -> opinion score. Positive is favorable.
    #[serde(default)]
    pub opinions: HashMap<AgentId, i32>,
}

impl Agent {
    /// Create a new agent with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            traits: Vec::new(),
            opinions: HashMap::new(),
        }
    }

    /// Append a trait descriptor.
    pub fn with_trait(mut self, descriptor: impl Into<String>) -> Self {
        self.traits.push(descriptor.into());
        self
    }

    /// Append several trait descriptors, keeping their order.
    pub fn with_traits<I, S>(mut self, descriptors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits.extend(descriptors.into_iter().map(Into::into));
        self
    }

    /// Set this agent's opinion of another agent.
    pub fn with_opinion_of(mut self, other: AgentId, opinion: i32) -> Self {
        self.opinions.insert(other, opinion);
        self
    }

    /// Opinion of another agent; 0 when none has formed yet.
    pub fn opinion_of(&self, other: AgentId) -> i32 {
        self.opinions.get(&other).copied().unwrap_or(0)
    }

    /// Shift the opinion of another agent by `delta`.
    pub fn adjust_opinion(&mut self, other: AgentId, delta: i32) {
        let current = self.opinions.entry(other).or_insert(0);
        *current = current.saturating_add(delta);
    }
}
