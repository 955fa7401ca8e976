//! Hardware and timers driven by the print engine

use crate::reactor::{Reactor, TimerHandle};
use resinkit_communication::{Motor, Projector, Thermometer};
use resinkit_core::{EventKind, ReactorError};

/// Devices the engine owns
pub struct PrinterHardware {
    pub motor: Motor,
    pub projector: Projector,
    pub thermometer: Box<dyn Thermometer>,
}

/// Handles to the engine's reactor timers
#[derive(Clone)]
pub struct EngineTimers {
    pub delay: TimerHandle,
    pub exposure: TimerHandle,
    pub motor_timeout: TimerHandle,
    pub temperature: TimerHandle,
}

impl EngineTimers {
    /// Register one timer per timer event kind
    pub fn register(reactor: &mut Reactor) -> Result<Self, ReactorError> {
        Ok(Self {
            delay: reactor.add_timer(EventKind::DelayEnd)?,
            exposure: reactor.add_timer(EventKind::ExposureEnd)?,
            motor_timeout: reactor.add_timer(EventKind::MotorTimeout)?,
            temperature: reactor.add_timer(EventKind::TemperatureTimer)?,
        })
    }

    /// Disarm the timers tied to a print in progress
    pub fn clear_print_timers(&self) {
        self.delay.clear();
        self.exposure.clear();
        self.motor_timeout.clear();
    }
}
