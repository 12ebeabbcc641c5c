//! Flavor text demo CLI
//!
//! Builds a three-agent colony, wires the interceptor to a generation
//! backend, records a few interactions and prints what ends up on the
//! message surface.
//!
//! Usage:
//!   cargo run -p demo
//!   cargo run -p demo -- --endpoint http://gpu-box:11434 --model mistral
//!   RUST_LOG=debug cargo run -p demo -- --config flavor.toml

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use narrative_core::{EventInterceptor, FlavorSettings, OllamaClient, SettingsStore};
use sim_world::{Agent, AgentId, EntryBody, EventId, InteractionKind, MessageLog, World};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Generated flavor text for colony interactions.
#[derive(Parser)]
#[command(name = "demo", about = "Flavor text pipeline demo")]
struct Cli {
    /// Settings file (TOML). Missing file means defaults.
    #[arg(long, default_value = "flavor.toml", env = "FLAVOR_CONFIG")]
    config: PathBuf,

    /// Override the backend base URL.
    #[arg(long, env = "FLAVOR_ENDPOINT")]
    endpoint: Option<String>,

    /// Override the model name.
    #[arg(long)]
    model: Option<String>,

    /// Override the sampling temperature.
    #[arg(long)]
    temperature: Option<f32>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    tracing::info!(model = %settings.model, endpoint = %settings.endpoint, "starting demo");

    let settings = Arc::new(SettingsStore::new(settings));
    let messages = Arc::new(MessageLog::new());
    let interceptor = Arc::new(EventInterceptor::new(
        settings,
        Arc::new(OllamaClient::new()?),
        messages.clone(),
        Handle::current(),
    ));

    let mut world = World::new();
    world.subscribe(interceptor.clone());
    run_script(&mut world)?;

    interceptor.drain().await;

    println!();
    println!("Play log");
    println!("========");
    for entry in world.play_log() {
        println!("  [{:>5}] {}", entry.tick, entry.rendered_text());
    }

    println!();
    println!("Messages");
    println!("========");
    if messages.is_empty() {
        println!("  (none - is the backend reachable?)");
    }
    for message in messages.drain() {
        println!("  {}", message.text);
    }

    let stats = interceptor.stats();
    println!();
    println!(
        "seen {} / dispatched {} / delivered {} / failed {} / duplicates {}",
        stats.seen, stats.dispatched, stats.delivered, stats.failed, stats.duplicates
    );
    Ok(())
}

fn load_settings(cli: &Cli) -> anyhow::Result<FlavorSettings> {
    let mut settings = FlavorSettings::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(endpoint) = &cli.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }
    if let Some(temperature) = cli.temperature {
        settings.temperature = temperature;
    }

    settings.validate().context("invalid settings")?;
    Ok(settings)
}

// ── Scripted colony ───────────────────────────────────────────────────────────

fn run_script(world: &mut World) -> anyhow::Result<()> {
    let bob = Agent::new("Bob").with_traits(["Grumpy", "Night owl"]);
    let cara = Agent::new("Cara").with_traits(["Abrasive", "Tough"]);
    let alice = Agent::new("Alice")
        .with_trait("Kind")
        .with_opinion_of(bob.id, 15)
        .with_opinion_of(cara.id, -20);
    let cara = cara.with_opinion_of(bob.id, 5);

    let alice = world.add_agent(alice);
    let bob = world.add_agent(bob);
    let cara = world.add_agent(cara);

    let compliment = interact(
        world,
        InteractionKind::KindWords,
        alice,
        bob,
        "<b>Alice</b> complimented Bob on his cooking.",
    )?;

    world.advance_ticks(600);
    interact(
        world,
        InteractionKind::Insult,
        alice,
        cara,
        "Alice insulted Cara's <color=#FF4444>haircut</color>.",
    )?;

    world.advance_ticks(600);
    world.record(EntryBody::Combat {
        attacker: Some(cara),
        target: Some(alice),
        text: "Cara punched Alice.".to_string(),
    });

    world.advance_ticks(600);
    interact(
        world,
        InteractionKind::DeepTalk,
        cara,
        bob,
        "Cara and Bob talked about the winter stores.",
    )?;

    // The host re-notifies an old entry; it must not produce a second message.
    world.redeliver(compliment);
    Ok(())
}

/// Record an interaction and let it shift how the recipient sees the
/// initiator.
fn interact(
    world: &mut World,
    kind: InteractionKind,
    initiator: AgentId,
    recipient: AgentId,
    text: &str,
) -> anyhow::Result<EventId> {
    let id = world.record_interaction(kind, initiator, recipient, text)?;
    let delta = if kind.is_hostile() { -10 } else { 5 };
    if let Some(agent) = world.agent_mut(recipient) {
        agent.adjust_opinion(initiator, delta);
    }
    Ok(id)
}
