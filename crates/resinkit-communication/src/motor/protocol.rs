//! Motor controller wire protocol
//!
//! Every command is a frame of one register byte, one action byte and an
//! optional little-endian `i32` argument. Completion of a motion is reported
//! asynchronously: the controller raises its interrupt line and the status
//! register holds 0 for success or a non-zero failure code.

use resinkit_core::MotorError;
use std::fmt;

/// I2C address of the motor controller
pub const MOTOR_ADDRESS: u8 = 0x10;

/// Status register read after a motor interrupt
pub const STATUS_REGISTER: u8 = 0x30;

/// Status byte reported on success
pub const STATUS_SUCCESS: u8 = 0x00;

/// Status byte reported when the controller itself has failed
pub const STATUS_CONTROLLER_ERROR: u8 = 0xFF;

pub mod register {
    pub const GENERAL: u8 = 0x20;
    pub const ROTATION_SETTINGS: u8 = 0x21;
    pub const ROTATION_ACTION: u8 = 0x22;
    pub const Z_SETTINGS: u8 = 0x23;
    pub const Z_ACTION: u8 = 0x24;
}

// Drive train parameters sent during initialization
const STEP_ANGLE_MILLIDEGREES: i32 = 1800;
const MICROSTEPPING_LOG2: i32 = 6;
const Z_MICRONS_PER_REV: i32 = 2000;
const ROTATION_MILLIDEGREES_PER_REV: i32 = 360_000;

/// Controller-wide actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GeneralAction {
    Reset = 0x01,
    RequestInterrupt = 0x02,
    Pause = 0x03,
    Resume = 0x04,
    ClearPending = 0x05,
    EnableMotors = 0x06,
    DisableMotors = 0x07,
}

/// Motion axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rotation,
    Z,
}

impl Axis {
    fn settings_register(self) -> u8 {
        match self {
            Axis::Rotation => register::ROTATION_SETTINGS,
            Axis::Z => register::Z_SETTINGS,
        }
    }

    fn action_register(self) -> u8 {
        match self {
            Axis::Rotation => register::ROTATION_ACTION,
            Axis::Z => register::Z_ACTION,
        }
    }
}

/// Per-axis settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AxisSetting {
    StepAngle = 0x10,
    UnitsPerRevolution = 0x11,
    Microstepping = 0x12,
    Jerk = 0x13,
    Speed = 0x14,
    MaxTravel = 0x15,
}

/// Per-axis motions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AxisAction {
    Move = 0x01,
    Home = 0x02,
}

/// One low-level controller command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    pub register: u8,
    pub action: u8,
    pub value: Option<i32>,
}

impl MotorCommand {
    pub fn general(action: GeneralAction) -> Self {
        Self {
            register: register::GENERAL,
            action: action as u8,
            value: None,
        }
    }

    pub fn setting(axis: Axis, setting: AxisSetting, value: i32) -> Self {
        Self {
            register: axis.settings_register(),
            action: setting as u8,
            value: Some(value),
        }
    }

    pub fn motion(axis: Axis, action: AxisAction, value: i32) -> Self {
        Self {
            register: axis.action_register(),
            action: action as u8,
            value: Some(value),
        }
    }

    /// Frame bytes as sent on the bus
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(6);
        frame.push(self.register);
        frame.push(self.action);
        if let Some(value) = self.value {
            frame.extend_from_slice(&value.to_le_bytes());
        }
        frame
    }

    /// Parse a frame produced by [`MotorCommand::encode`]
    pub fn decode(frame: &[u8]) -> Option<Self> {
        match frame {
            [register, action] => Some(Self {
                register: *register,
                action: *action,
                value: None,
            }),
            [register, action, a, b, c, d] => Some(Self {
                register: *register,
                action: *action,
                value: Some(i32::from_le_bytes([*a, *b, *c, *d])),
            }),
            _ => None,
        }
    }

    /// Whether this command asks the controller for a completion interrupt
    pub fn is_interrupt_request(&self) -> bool {
        *self == Self::general(GeneralAction::RequestInterrupt)
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}/0x{:02X}", self.register, self.action)?;
        if let Some(value) = self.value {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

/// Drive train setup sent by `Initialize`
pub(crate) fn drive_train_settings(max_z_travel_microns: i32) -> Vec<MotorCommand> {
    vec![
        MotorCommand::setting(Axis::Z, AxisSetting::StepAngle, STEP_ANGLE_MILLIDEGREES),
        MotorCommand::setting(Axis::Z, AxisSetting::UnitsPerRevolution, Z_MICRONS_PER_REV),
        MotorCommand::setting(Axis::Z, AxisSetting::Microstepping, MICROSTEPPING_LOG2),
        MotorCommand::setting(Axis::Z, AxisSetting::MaxTravel, max_z_travel_microns),
        MotorCommand::setting(Axis::Rotation, AxisSetting::StepAngle, STEP_ANGLE_MILLIDEGREES),
        MotorCommand::setting(
            Axis::Rotation,
            AxisSetting::UnitsPerRevolution,
            ROTATION_MILLIDEGREES_PER_REV,
        ),
        MotorCommand::setting(Axis::Rotation, AxisSetting::Microstepping, MICROSTEPPING_LOG2),
    ]
}

/// Classify a status byte read after a motor interrupt
pub fn check_status(status: u8) -> Result<(), MotorError> {
    if status == STATUS_SUCCESS {
        Ok(())
    } else {
        Err(MotorError::Status { status })
    }
}
