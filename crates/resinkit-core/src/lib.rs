//! # ResinKit Core
//!
//! Core types shared by every ResinKit crate: the error taxonomy, the
//! printer status snapshot, reactor event kinds and payloads, the host
//! command surface, and the status bus.

pub mod constants;
pub mod data;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod types;

pub use data::{
    LayerType, PrintEngineState, PrintRating, PrinterStatus, StateChange, UiSubState,
};

pub use error::{
    Error, ErrorCode, HardwareError, MotorError, PrintDataError, ReactorError, Result,
};

pub use event::{Command, EventData, EventKind};

pub use event_bus::{StatusBus, StatusBusConfig, StatusFilter, SubscriptionId};

pub use types::{
    shared, thread_safe_deque, thread_safe_none, thread_safe_vec, Shared, ThreadSafeDeque,
    ThreadSafeOption, ThreadSafeVec,
};
