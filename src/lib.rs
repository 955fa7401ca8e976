//! # ResinKit
//!
//! Control core for a stereolithographic resin printer.
//!
//! ## Architecture
//!
//! ResinKit is organized as a workspace with multiple crates:
//!
//! 1. **resinkit-core** - Error codes, printer status, event kinds, host commands, status bus
//! 2. **resinkit-settings** - Printer settings, per-layer overrides, motion kinematics
//! 3. **resinkit-communication** - Motor controller, front panel, projector, thermometer
//! 4. **resinkit-engine** - Event reactor, printer state machine, print engine
//! 5. **resinkit** - Main binary that wires the hardware to the engine and runs the reactor
//!
//! Hardware access primitives are external; this binary drives either no-op
//! devices or a simulated motor controller.

pub mod app;
pub mod cli;
pub mod simulation;

pub use cli::Args;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Console output filtered by `RUST_LOG` on top of an INFO default; `json`
/// selects one JSON object per line for log collectors.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_thread_names(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
