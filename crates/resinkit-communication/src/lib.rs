//! # ResinKit Communication
//!
//! Contracts for the printer's hardware collaborators and the drivers built
//! on them: the motor controller and its command sequencer, the front panel
//! buttons, the projector with its pending-image slot, and the thermometer.
//! Each contract has a simulated implementation used by tests and by the
//! binary's simulation mode.

pub mod front_panel;
pub mod i2c;
pub mod motor;
pub mod projector;
pub mod thermometer;

pub use front_panel::{ButtonCode, ButtonEvent, FrontPanel, FRONT_PANEL_ADDRESS};
pub use i2c::{wait_until_ready, I2cDevice, NoOpI2cDevice, ReadyPolicy, SimulatedI2cDevice};
pub use motor::{HighLevelMotorCommand, Motor, MotorCommand, MOTOR_ADDRESS};
pub use projector::{
    prepare_image, ProjectedFrame, Projector, ProjectorDevice, SimulatedProjector,
};
pub use thermometer::{OneWireThermometer, SimulatedThermometer, Thermometer};
