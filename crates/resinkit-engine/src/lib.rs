//! # ResinKit Engine
//!
//! The single-threaded event reactor, the printer state machine and the print
//! engine that joins them to the hardware. Print data access and background
//! image preparation live here too.

pub mod print_data;
pub mod print_engine;
pub mod reactor;
pub mod state_machine;
pub mod worker;

pub use print_data::{contains_print_data, install_print_data, DirectoryPrintData, PrintData};
pub use print_engine::{EngineTimers, PrintEngine, PrinterHardware};
pub use reactor::{
    spawn_line_reader, InterruptLine, QueueSender, Reactor, Resource, SignalResource, StopHandle,
    TimerHandle,
};
pub use state_machine::{
    BootConditions, Pattern, PrintOutcome, PrinterActions, PrinterEvent, PrinterStateMachine,
};
pub use worker::{BackgroundWorker, ImageJob};
