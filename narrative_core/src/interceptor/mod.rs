//! Event Interceptor - the entry point of the flavor pipeline.
//!
//! For every play log entry the host delivers:
//! 1. **Filter**: skip when disabled, not an interaction, or already handled
//! 2. **Extract**: resolve both participants and strip markup from the text
//! 3. **Mark**: record the entry as handled before anything is dispatched
//! 4. **Dispatch**: generate, sanitize and notify on a background task
//!
//! The host thread only ever runs steps 1-3. Failures anywhere are logged and
//! dropped; the host never sees them.

mod processed;

pub use processed::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use sim_world::{Agent, AgentId, EventId, Message, MessageSink, PlayLogEntry, PlayLogObserver, World};

use crate::client::TextGenerator;
use crate::error::{GenerationError, InterceptError};
use crate::prompt::PromptBuilder;
use crate::sanitizer::{sanitize, strip_markup};
use crate::settings::{FlavorSettings, SettingsStore};

/// Counts of what the interceptor did with the entries it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterceptorStats {
    /// Every delivery, duplicates included.
    pub seen: u64,
    /// Disabled or not an interaction.
    pub skipped: u64,
    /// Participants could not be resolved.
    pub rejected: u64,
    /// Redeliveries of an entry already handled.
    pub duplicates: u64,
    /// Generation tasks started.
    pub dispatched: u64,
    /// Notifications posted.
    pub delivered: u64,
    /// Generation tasks that ended without a notification.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    seen: AtomicU64,
    skipped: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> InterceptorStats {
        InterceptorStats {
            seen: self.seen.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// A prepared generation: everything the background task needs, owned.
#[derive(Debug)]
struct GenerationJob {
    event_id: EventId,
    initiator_name: String,
    prompt: String,
    settings: Arc<FlavorSettings>,
}

/// Watches the play log and adds generated flavor notifications.
pub struct EventInterceptor {
    settings: Arc<SettingsStore>,
    generator: Arc<dyn TextGenerator>,
    sink: Arc<dyn MessageSink>,
    processed: ProcessedSet,
    runtime: Handle,
    tasks: TaskTracker,
    drain_lock: AsyncMutex<()>,
    counters: Arc<Counters>,
}

impl EventInterceptor {
    /// Create an interceptor.
    ///
    /// Background work runs on `runtime`, so `on_event` may be called from
    /// threads outside it. The processed set is sized from the settings
    /// current at construction.
    pub fn new(
        settings: Arc<SettingsStore>,
        generator: Arc<dyn TextGenerator>,
        sink: Arc<dyn MessageSink>,
        runtime: Handle,
    ) -> Self {
        let processed = ProcessedSet::from_settings(&settings.snapshot().dedup);
        Self {
            settings,
            generator,
            sink,
            processed,
            runtime,
            tasks: TaskTracker::new(),
            drain_lock: AsyncMutex::new(()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Handle one delivered play log entry.
    ///
    /// Returns promptly. When a generation was dispatched, its task handle is
    /// returned; dropping it does not cancel the task.
    pub fn on_event(&self, entry: &PlayLogEntry, world: &World) -> Option<JoinHandle<()>> {
        Counters::bump(&self.counters.seen);

        let settings = self.settings.snapshot();
        if !settings.enabled {
            debug!(event = %entry.id, "flavor text disabled, skipping");
            Counters::bump(&self.counters.skipped);
            return None;
        }

        if !entry.is_interaction() {
            Counters::bump(&self.counters.skipped);
            return None;
        }

        if self.processed.contains(entry.id) {
            debug!(event = %entry.id, "entry already handled");
            Counters::bump(&self.counters.duplicates);
            return None;
        }

        let job = match prepare_job(entry, world, settings) {
            Ok(job) => job,
            Err(e) => {
                warn!(event = %entry.id, error = %e, "skipping interaction");
                Counters::bump(&self.counters.rejected);
                return None;
            }
        };

        // A concurrent delivery may have won between the check and here.
        if !self.processed.try_mark(entry.id) {
            debug!(event = %entry.id, "entry already handled");
            Counters::bump(&self.counters.duplicates);
            return None;
        }

        Counters::bump(&self.counters.dispatched);
        debug!(event = %entry.id, prompt_chars = job.prompt.len(), "dispatching generation");

        let task = run_job(
            job,
            Arc::clone(&self.generator),
            Arc::clone(&self.sink),
            Arc::clone(&self.counters),
        );
        Some(self.tasks.spawn_on(task, &self.runtime))
    }

    /// Wait for every generation task started so far.
    ///
    /// Concurrent callers drain one at a time, so the tracker is never
    /// reopened while another caller is still waiting on it.
    pub async fn drain(&self) {
        let _owner = self.drain_lock.lock().await;
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Number of generation tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn stats(&self) -> InterceptorStats {
        self.counters.snapshot()
    }
}

impl PlayLogObserver for EventInterceptor {
    fn on_entry_recorded(&self, entry: &PlayLogEntry, world: &World) {
        self.on_event(entry, world);
    }
}

fn resolve<'w>(
    world: &'w World,
    id: Option<AgentId>,
    role: &str,
) -> Result<&'w Agent, InterceptError> {
    let id = id.ok_or_else(|| InterceptError::Extraction {
        reason: format!("{} is missing", role),
    })?;
    world.agent(id).ok_or_else(|| InterceptError::Extraction {
        reason: format!("{} {} is not in the world", role, id),
    })
}

fn prepare_job(
    entry: &PlayLogEntry,
    world: &World,
    settings: Arc<FlavorSettings>,
) -> Result<GenerationJob, InterceptError> {
    let (initiator, recipient) = entry.participants();
    let initiator = resolve(world, initiator, "initiator")?;
    let recipient = resolve(world, recipient, "recipient")?;

    let original_text = strip_markup(entry.rendered_text());
    let prompt =
        PromptBuilder::new(settings.prompt.clone()).build_prompt(initiator, recipient, &original_text);

    Ok(GenerationJob {
        event_id: entry.id,
        initiator_name: initiator.name.clone(),
        prompt,
        settings,
    })
}

async fn run_job(
    job: GenerationJob,
    generator: Arc<dyn TextGenerator>,
    sink: Arc<dyn MessageSink>,
    counters: Arc<Counters>,
) {
    let deadline = job.settings.request_timeout();
    let outcome = tokio::time::timeout(deadline, generator.generate(&job.settings, &job.prompt))
        .await
        .unwrap_or_else(|_| {
            Err(GenerationError::Timeout {
                after_ms: deadline.as_millis() as u64,
            })
        });

    let text = match outcome {
        Ok(text) => text,
        Err(e) => {
            warn!(event = %job.event_id, model = %job.settings.model, error = %e, "generation failed");
            Counters::bump(&counters.failed);
            return;
        }
    };

    let text = sanitize(&text);
    if text.is_empty() {
        debug!(event = %job.event_id, "generated text was empty after cleanup");
        Counters::bump(&counters.failed);
        return;
    }

    sink.post(Message::neutral(format!("{}: {}", job.initiator_name, text)));
    Counters::bump(&counters.delivered);
    info!(event = %job.event_id, initiator = %job.initiator_name, "posted flavor text");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sim_world::{AgentId, EntryBody, InteractionKind, MessageLog, MessageSeverity};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::error::GenerationResult;

    /// Replies with a fixed text and records every prompt it was given.
    struct ScriptedGenerator {
        reply: GenerationResult<String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(GenerationError::Transport {
                    reason: "connection refused".to_string(),
                }),
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn stalling(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok("too late".to_string()),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _settings: &FlavorSettings, prompt: &str) -> GenerationResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(GenerationError::Transport {
                    reason: e.to_string(),
                }),
            }
        }
    }

    struct Fixture {
        world: World,
        alice: AgentId,
        bob: AgentId,
        settings: Arc<SettingsStore>,
        messages: Arc<MessageLog>,
    }

    fn fixture() -> Fixture {
        let mut world = World::new();
        let bob = Agent::new("Bob").with_trait("Grumpy");
        let alice = Agent::new("Alice")
            .with_trait("Kind")
            .with_opinion_of(bob.id, 15);
        let bob = world.add_agent(bob);
        let alice = world.add_agent(alice);

        Fixture {
            world,
            alice,
            bob,
            settings: Arc::new(SettingsStore::new(FlavorSettings::default())),
            messages: Arc::new(MessageLog::new()),
        }
    }

    fn interceptor(fx: &Fixture, generator: Arc<dyn TextGenerator>) -> EventInterceptor {
        EventInterceptor::new(
            Arc::clone(&fx.settings),
            generator,
            fx.messages.clone(),
            Handle::current(),
        )
    }

    fn interaction(fx: &Fixture, text: &str) -> PlayLogEntry {
        PlayLogEntry::new(
            0,
            EntryBody::Interaction {
                kind: InteractionKind::KindWords,
                initiator: Some(fx.alice),
                recipient: Some(fx.bob),
                text: text.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_generates_notification() {
        let fx = fixture();
        let generator = ScriptedGenerator::replying("<color=#FF0000>Bob smiles warmly.</color>");
        let interceptor = interceptor(&fx, generator.clone());

        let entry = interaction(&fx, "<b>Alice</b> complimented Bob.");
        let handle = interceptor.on_event(&entry, &fx.world);
        assert!(handle.is_some());
        handle.unwrap().await.unwrap();

        let messages = fx.messages.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Alice: Bob smiles warmly.");
        assert_eq!(messages[0].severity, MessageSeverity::Neutral);

        let prompts = generator.prompts.lock();
        assert!(prompts[0].contains("Positive (15 opinion)"));
        assert!(prompts[0].contains("Traits: Kind"));
        assert!(prompts[0].contains("Traits: Grumpy"));
        assert!(prompts[0].contains("Alice complimented Bob."));
        assert!(!prompts[0].contains("<b>"));
    }

    #[tokio::test]
    async fn test_redelivery_is_ignored() {
        let fx = fixture();
        let generator = ScriptedGenerator::replying("Bob nods.");
        let interceptor = interceptor(&fx, generator.clone());

        let entry = interaction(&fx, "Alice greeted Bob.");
        assert!(interceptor.on_event(&entry, &fx.world).is_some());
        assert!(interceptor.on_event(&entry, &fx.world).is_none());
        interceptor.drain().await;
        assert!(interceptor.on_event(&entry, &fx.world).is_none());
        interceptor.drain().await;

        assert_eq!(generator.calls(), 1);
        assert_eq!(fx.messages.len(), 1);

        let stats = interceptor.stats();
        assert_eq!(stats.seen, 3);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test]
    async fn test_disabled_has_no_side_effects() {
        let fx = fixture();
        fx.settings.set_enabled(false);
        let generator = ScriptedGenerator::replying("Bob nods.");
        let interceptor = interceptor(&fx, generator.clone());

        let entry = interaction(&fx, "Alice greeted Bob.");
        assert!(interceptor.on_event(&entry, &fx.world).is_none());
        interceptor.drain().await;

        assert_eq!(generator.calls(), 0);
        assert!(fx.messages.is_empty());
        assert_eq!(interceptor.stats().skipped, 1);

        // Disabled deliveries do not consume the entry.
        fx.settings.set_enabled(true);
        assert!(interceptor.on_event(&entry, &fx.world).is_some());
    }

    #[tokio::test]
    async fn test_non_interaction_ignored() {
        let fx = fixture();
        let generator = ScriptedGenerator::replying("Bob nods.");
        let interceptor = interceptor(&fx, generator.clone());

        let entry = PlayLogEntry::new(
            0,
            EntryBody::Combat {
                attacker: Some(fx.alice),
                target: Some(fx.bob),
                text: "Alice punched Bob.".to_string(),
            },
        );
        assert!(interceptor.on_event(&entry, &fx.world).is_none());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_participant() {
        let mut fx = fixture();
        let generator = ScriptedGenerator::replying("Bob nods.");
        let interceptor = interceptor(&fx, generator.clone());

        let missing = PlayLogEntry::new(
            0,
            EntryBody::Interaction {
                kind: InteractionKind::Chitchat,
                initiator: Some(fx.alice),
                recipient: None,
                text: "Alice talked to nobody.".to_string(),
            },
        );
        assert!(interceptor.on_event(&missing, &fx.world).is_none());

        let gone = interaction(&fx, "Alice greeted Bob.");
        fx.world.remove_agent(fx.bob);
        assert!(interceptor.on_event(&gone, &fx.world).is_none());

        interceptor.drain().await;
        assert_eq!(generator.calls(), 0);
        assert_eq!(interceptor.stats().rejected, 2);
    }

    #[tokio::test]
    async fn test_generation_failure_is_swallowed() {
        let fx = fixture();
        let generator = ScriptedGenerator::failing();
        let interceptor = interceptor(&fx, generator.clone());

        let entry = interaction(&fx, "Alice greeted Bob.");
        interceptor.on_event(&entry, &fx.world).unwrap().await.unwrap();

        assert_eq!(generator.calls(), 1);
        assert!(fx.messages.is_empty());
        assert_eq!(interceptor.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_empty_generation_posts_nothing() {
        let fx = fixture();
        let generator = ScriptedGenerator::replying("<color=red></color>");
        let interceptor = interceptor(&fx, generator.clone());

        let entry = interaction(&fx, "Alice greeted Bob.");
        interceptor.on_event(&entry, &fx.world).unwrap().await.unwrap();

        assert!(fx.messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_generation_hits_deadline() {
        let fx = fixture();
        fx.settings.update(|s| s.request_timeout_secs = 2);
        let generator = ScriptedGenerator::stalling(Duration::from_secs(600));
        let interceptor = interceptor(&fx, generator.clone());

        let entry = interaction(&fx, "Alice greeted Bob.");
        interceptor.on_event(&entry, &fx.world).unwrap().await.unwrap();

        assert!(fx.messages.is_empty());
        assert_eq!(interceptor.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_snapshot_taken_at_interception() {
        let fx = fixture();
        let generator = ScriptedGenerator::stalling(Duration::from_millis(50));
        let interceptor = interceptor(&fx, generator.clone());

        let entry = interaction(&fx, "Alice greeted Bob.");
        let handle = interceptor.on_event(&entry, &fx.world).unwrap();

        // Disabling mid-flight does not cancel the attempt already started.
        fx.settings.set_enabled(false);
        handle.await.unwrap();

        assert_eq!(fx.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_observer_wiring() {
        let mut fx = fixture();
        let generator = ScriptedGenerator::replying("Bob blushes.");
        let interceptor = Arc::new(interceptor(&fx, generator.clone()));
        fx.world.subscribe(interceptor.clone());

        let id = fx
            .world
            .record_interaction(InteractionKind::KindWords, fx.alice, fx.bob, "Alice complimented Bob.")
            .unwrap();
        assert!(fx.world.redeliver(id));
        interceptor.drain().await;

        assert_eq!(generator.calls(), 1);
        assert_eq!(fx.messages.messages()[0].text, "Alice: Bob blushes.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_drains_both_complete() {
        let fx = fixture();
        let generator = ScriptedGenerator::stalling(Duration::from_millis(50));
        let interceptor = interceptor(&fx, generator.clone());

        interceptor.on_event(&interaction(&fx, "Alice greeted Bob."), &fx.world);
        interceptor.on_event(&interaction(&fx, "Alice waved at Bob."), &fx.world);
        tokio::join!(interceptor.drain(), interceptor.drain());

        assert_eq!(interceptor.in_flight(), 0);
        assert_eq!(fx.messages.len(), 2);

        // The tracker accepts new work after draining.
        interceptor.on_event(&interaction(&fx, "Alice hugged Bob."), &fx.world);
        interceptor.drain().await;
        assert_eq!(fx.messages.len(), 3);
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_events() {
        let fx = fixture();
        let generator = ScriptedGenerator::replying("Bob reacts.");
        let interceptor = interceptor(&fx, generator.clone());

        let entries: Vec<PlayLogEntry> = (0..100)
            .map(|i| interaction(&fx, &format!("Alice greeted Bob ({}).", i)))
            .collect();

        // Every entry is delivered twice, from two different threads.
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let entries = &entries;
                let interceptor = &interceptor;
                let world = &fx.world;
                scope.spawn(move || {
                    for (i, entry) in entries.iter().enumerate() {
                        if i % 2 == worker % 2 {
                            interceptor.on_event(entry, world);
                        }
                    }
                });
            }
        });
        interceptor.drain().await;

        assert_eq!(generator.calls(), 100);
        assert_eq!(fx.messages.len(), 100);

        let stats = interceptor.stats();
        assert_eq!(stats.seen, 200);
        assert_eq!(stats.dispatched, 100);
        assert_eq!(stats.duplicates, 100);
        assert_eq!(stats.delivered, 100);
    }
}
