//! Event system for the printer reactor
//!
//! Provides:
//! - Event kinds the reactor multiplexes
//! - The closed payload type delivered with each event
//! - The host command surface

pub mod command;
pub mod events;

pub use command::Command;
pub use events::{EventData, EventKind};
