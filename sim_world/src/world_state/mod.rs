//! World state - agents, the play log, and the observers watching it.

mod play_log;

pub use play_log::*;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

use crate::entities::{Agent, AgentId, EventId};
use crate::mechanics::InteractionKind;

/// Default number of entries the play log keeps.
pub const DEFAULT_LOG_CAPACITY: usize = 150;

/// Errors raised by world mutations.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("unknown agent: {id}")]
    UnknownAgent { id: AgentId },
}

/// Subscriber notified after an entry has been recorded.
///
/// Observers run synchronously on the recording thread and must return
/// promptly. They may be called again for the same entry on redelivery.
pub trait PlayLogObserver: Send + Sync {
    fn on_entry_recorded(&self, entry: &PlayLogEntry, world: &World);
}

/// The complete state of the simulation at any point in time.
pub struct World {
    /// Current simulation tick.
    pub tick: u64,

    agents: HashMap<AgentId, Agent>,

    /// Most recent entries, oldest first.
    play_log: VecDeque<PlayLogEntry>,
    log_capacity: usize,

    observers: Vec<Arc<dyn PlayLogObserver>>,
}

impl Default for World {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("agents", &self.agents.len())
            .field("play_log", &self.play_log.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl World {
    /// Create a new empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world whose play log keeps at most `capacity` entries.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            tick: 0,
            agents: HashMap::new(),
            play_log: VecDeque::new(),
            log_capacity: capacity.max(1),
            observers: Vec::new(),
        }
    }

    /// Add an agent to the world.
    pub fn add_agent(&mut self, agent: Agent) -> AgentId {
        let id = agent.id;
        self.agents.insert(id, agent);
        id
    }

    /// Remove an agent. Entries that mention it stay in the log.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    /// Get agent by ID.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Get mutable agent by ID.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Register an observer for newly recorded entries.
    pub fn subscribe(&mut self, observer: Arc<dyn PlayLogObserver>) {
        self.observers.push(observer);
    }

    /// Advance the simulation clock.
    pub fn advance_ticks(&mut self, ticks: u64) {
        self.tick = self.tick.saturating_add(ticks);
    }

    /// Record a new entry at the current tick.
    pub fn record(&mut self, body: EntryBody) -> EventId {
        self.record_entry(PlayLogEntry::new(self.tick, body))
    }

    /// Record a pre-built entry.
    ///
    /// The entry is stored before any observer sees it.
    pub fn record_entry(&mut self, entry: PlayLogEntry) -> EventId {
        let id = entry.id;

        self.play_log.push_back(entry);
        while self.play_log.len() > self.log_capacity {
            self.play_log.pop_front();
        }

        if let Some(entry) = self.play_log.back() {
            self.notify(entry);
        }
        id
    }

    /// Record an interaction between two known agents.
    pub fn record_interaction(
        &mut self,
        kind: InteractionKind,
        initiator: AgentId,
        recipient: AgentId,
        text: impl Into<String>,
    ) -> Result<EventId, WorldError> {
        for id in [initiator, recipient] {
            if !self.agents.contains_key(&id) {
                return Err(WorldError::UnknownAgent { id });
            }
        }

        Ok(self.record(EntryBody::Interaction {
            kind,
            initiator: Some(initiator),
            recipient: Some(recipient),
            text: text.into(),
        }))
    }

    /// Notify observers of an already recorded entry again.
    ///
    /// Returns false if the entry is no longer in the log.
    pub fn redeliver(&self, id: EventId) -> bool {
        match self.entry(id) {
            Some(entry) => {
                self.notify(entry);
                true
            }
            None => false,
        }
    }

    /// Look up a recorded entry.
    pub fn entry(&self, id: EventId) -> Option<&PlayLogEntry> {
        self.play_log.iter().find(|e| e.id == id)
    }

    /// Recorded entries, oldest first.
    pub fn play_log(&self) -> impl Iterator<Item = &PlayLogEntry> {
        self.play_log.iter()
    }

    fn notify(&self, entry: &PlayLogEntry) {
        for observer in &self.observers {
            observer.on_entry_recorded(entry, self);
        }
    }
}
