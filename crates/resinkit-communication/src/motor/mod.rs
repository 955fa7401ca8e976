//! Motor controller
//!
//! - `protocol`: low-level frames, registers and status decoding
//! - `sequencer`: translation of high-level motions into frames

pub mod protocol;
pub mod sequencer;

pub use protocol::{
    check_status, Axis, AxisAction, AxisSetting, GeneralAction, MotorCommand, MOTOR_ADDRESS,
    STATUS_CONTROLLER_ERROR, STATUS_REGISTER, STATUS_SUCCESS,
};
pub use sequencer::Motor;

use resinkit_settings::{z_seconds, CurrentLayerSettings};
use std::fmt;

/// Motion intents issued by the print engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighLevelMotorCommand {
    /// Configure the drive train and enable the motors
    Initialize,
    /// Home both axes
    GoHome,
    /// Lower the build head onto the tray
    MoveToStartPosition,
    /// Rotate the tray and lift the build head after an exposure
    Separate,
    /// Bring the tray back and lower to the next layer
    Approach,
    /// Approach from the home rotation after a jam was cleared
    ApproachAfterJam,
    /// Press the build head into the resin
    Press,
    /// Release the press
    Unpress,
    /// Lift the build head so the print can be inspected
    PauseAndInspect,
    /// Return from the inspection position
    ResumeFromInspect,
    /// Try to free a jammed tray
    RecoverFromJam,
    /// Suspend the motion in progress
    Pause,
    /// Continue a suspended motion
    Resume,
    /// Drop all pending motions
    ClearPending,
    /// Drop all pending motions and report when the controller is idle
    CancelMotion,
}

impl HighLevelMotorCommand {
    /// Whether a completion interrupt will follow
    pub fn awaits_completion(&self) -> bool {
        !matches!(
            self,
            HighLevelMotorCommand::Initialize
                | HighLevelMotorCommand::Pause
                | HighLevelMotorCommand::Resume
                | HighLevelMotorCommand::ClearPending
        )
    }

    /// Expected duration of the motion in seconds
    pub fn motion_seconds(&self, layer: &CurrentLayerSettings) -> f64 {
        let params = &layer.params;
        match self {
            HighLevelMotorCommand::GoHome => layer.home_seconds(),
            HighLevelMotorCommand::MoveToStartPosition => layer.start_seconds(),
            HighLevelMotorCommand::Separate => params.separation_seconds(),
            HighLevelMotorCommand::Approach => params.approach_seconds(),
            HighLevelMotorCommand::ApproachAfterJam => {
                params.approach_seconds() + layer.unjam_seconds()
            }
            HighLevelMotorCommand::Press => z_seconds(params.press_microns, params.press_speed),
            HighLevelMotorCommand::Unpress => {
                z_seconds(params.press_microns, params.unpress_speed)
            }
            HighLevelMotorCommand::PauseAndInspect | HighLevelMotorCommand::ResumeFromInspect => {
                layer.inspect_seconds()
            }
            HighLevelMotorCommand::RecoverFromJam => layer.unjam_seconds(),
            HighLevelMotorCommand::Initialize
            | HighLevelMotorCommand::Pause
            | HighLevelMotorCommand::Resume
            | HighLevelMotorCommand::ClearPending
            | HighLevelMotorCommand::CancelMotion => 0.0,
        }
    }
}

impl fmt::Display for HighLevelMotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HighLevelMotorCommand::Initialize => "initialize",
            HighLevelMotorCommand::GoHome => "go home",
            HighLevelMotorCommand::MoveToStartPosition => "move to start position",
            HighLevelMotorCommand::Separate => "separate",
            HighLevelMotorCommand::Approach => "approach",
            HighLevelMotorCommand::ApproachAfterJam => "approach after jam",
            HighLevelMotorCommand::Press => "press",
            HighLevelMotorCommand::Unpress => "unpress",
            HighLevelMotorCommand::PauseAndInspect => "pause and inspect",
            HighLevelMotorCommand::ResumeFromInspect => "resume from inspect",
            HighLevelMotorCommand::RecoverFromJam => "recover from jam",
            HighLevelMotorCommand::Pause => "pause",
            HighLevelMotorCommand::Resume => "resume",
            HighLevelMotorCommand::ClearPending => "clear pending",
            HighLevelMotorCommand::CancelMotion => "cancel motion",
        };
        write!(f, "{}", name)
    }
}
