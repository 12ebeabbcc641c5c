//! # Sim World
//!
//! The host side of the simulation: agents with traits and opinions, the play
//! log that records their interactions, and the message surface that shows
//! notifications to the player.
//!
//! This crate owns no AI logic. Anything that wants to react to recorded
//! entries subscribes through [`PlayLogObserver`].

pub mod entities;
pub mod mechanics;
pub mod messages;
pub mod world_state;

pub use entities::*;
pub use mechanics::*;
pub use messages::*;
pub use world_state::*;
