//! # Status Bus Module
//!
//! Broadcasts `PrinterStatus` snapshots from the print engine to every
//! interested observer (front panel, logger, network layer).
//!
//! ## Overview
//!
//! - The print engine publishes one snapshot per state entry, state exit,
//!   or UI substate change
//! - Each subscriber receives its own clone of the snapshot
//! - Async consumers can poll a broadcast receiver instead of registering
//!   a handler
//!
//! ## Usage
//!
//! ```rust,ignore
//! use resinkit_core::event_bus::{StatusBus, StatusFilter};
//!
//! let bus = StatusBus::new();
//! let id = bus.subscribe(StatusFilter::EnteringOnly, |status| {
//!     println!("now in {}", status.state);
//! });
//! bus.unsubscribe(id);
//! ```

mod bus;

pub use bus::*;
