//! Printer status snapshot
//!
//! `PrinterStatus` is owned and mutated only by the print engine. Every
//! observer receives its own copy through the status bus.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leaf states of the printer state machine as reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintEngineState {
    /// Door open; all motion halted
    DoorOpen,
    /// Motor controller and status being reset
    Initializing,
    /// Moving build head and tray to home
    Homing,
    /// Idle at home position
    Home,
    /// Moving to the first layer position
    MovingToStartPosition,
    /// Waiting for the user to confirm or skip calibration
    Calibrating,
    /// Computing the next layer's parameters
    InitializingLayer,
    /// Pressing the build head into the resin
    Pressing,
    /// Holding the press
    PressDelay,
    /// Releasing the press
    Unpressing,
    /// Settling before exposure
    PreExposureDelay,
    /// Projector showing the slice image
    Exposing,
    /// Separating the cured layer from the tray
    Separating,
    /// Retrying a failed separation rotation
    Unjamming,
    /// Tray jammed; waiting for the user
    Jammed,
    /// Approaching the position for the next layer
    Approaching,
    /// Lifting to the inspection height
    MovingToPause,
    /// Paused for inspection
    Paused,
    /// Returning from the inspection height
    MovingToResume,
    /// Asking the user to confirm cancellation
    ConfirmCancel,
    /// Waiting for the controller to abandon pending motion
    AwaitingCancelation,
    /// Asking the user to rate the finished print
    GettingFeedback,
    /// Fatal error; waiting for reset
    Error,
    /// Showing firmware version information
    ShowingVersion,
    /// Showing the printer registration code
    Registering,
    /// Asking the user to confirm a projector upgrade
    ConfirmUpgrade,
    /// Projector firmware upgrade in progress
    UpgradingProjector,
    /// Projector upgrade finished; waiting for reset
    UpgradeComplete,
    /// Boot-time demonstration mode
    DemoMode,
    /// Projector showing a test or calibration pattern
    ShowingTestPattern,
}

impl PrintEngineState {
    /// States that belong to an active print job
    pub fn is_printing(&self) -> bool {
        matches!(
            self,
            PrintEngineState::MovingToStartPosition
                | PrintEngineState::Calibrating
                | PrintEngineState::InitializingLayer
                | PrintEngineState::Pressing
                | PrintEngineState::PressDelay
                | PrintEngineState::Unpressing
                | PrintEngineState::PreExposureDelay
                | PrintEngineState::Exposing
                | PrintEngineState::Separating
                | PrintEngineState::Unjamming
                | PrintEngineState::Jammed
                | PrintEngineState::Approaching
                | PrintEngineState::MovingToPause
                | PrintEngineState::Paused
                | PrintEngineState::MovingToResume
                | PrintEngineState::ConfirmCancel
                | PrintEngineState::AwaitingCancelation
        )
    }

    /// States in which a motor command is outstanding
    pub fn is_moving(&self) -> bool {
        matches!(
            self,
            PrintEngineState::Homing
                | PrintEngineState::MovingToStartPosition
                | PrintEngineState::Pressing
                | PrintEngineState::Unpressing
                | PrintEngineState::Separating
                | PrintEngineState::Unjamming
                | PrintEngineState::Approaching
                | PrintEngineState::MovingToPause
                | PrintEngineState::MovingToResume
                | PrintEngineState::AwaitingCancelation
        )
    }

    /// The press/expose/separate cycle of a single layer
    pub fn is_layer_sequence(&self) -> bool {
        matches!(
            self,
            PrintEngineState::Pressing
                | PrintEngineState::PressDelay
                | PrintEngineState::Unpressing
                | PrintEngineState::PreExposureDelay
                | PrintEngineState::Exposing
                | PrintEngineState::Separating
                | PrintEngineState::Approaching
        )
    }

    /// Upper-case name used on the wire and in logs
    pub fn name(&self) -> &'static str {
        match self {
            PrintEngineState::DoorOpen => "DOOR_OPEN",
            PrintEngineState::Initializing => "INITIALIZING",
            PrintEngineState::Homing => "HOMING",
            PrintEngineState::Home => "HOME",
            PrintEngineState::MovingToStartPosition => "MOVING_TO_START_POSITION",
            PrintEngineState::Calibrating => "CALIBRATING",
            PrintEngineState::InitializingLayer => "INITIALIZING_LAYER",
            PrintEngineState::Pressing => "PRESSING",
            PrintEngineState::PressDelay => "PRESS_DELAY",
            PrintEngineState::Unpressing => "UNPRESSING",
            PrintEngineState::PreExposureDelay => "PRE_EXPOSURE_DELAY",
            PrintEngineState::Exposing => "EXPOSING",
            PrintEngineState::Separating => "SEPARATING",
            PrintEngineState::Unjamming => "UNJAMMING",
            PrintEngineState::Jammed => "JAMMED",
            PrintEngineState::Approaching => "APPROACHING",
            PrintEngineState::MovingToPause => "MOVING_TO_PAUSE",
            PrintEngineState::Paused => "PAUSED",
            PrintEngineState::MovingToResume => "MOVING_TO_RESUME",
            PrintEngineState::ConfirmCancel => "CONFIRM_CANCEL",
            PrintEngineState::AwaitingCancelation => "AWAITING_CANCELATION",
            PrintEngineState::GettingFeedback => "GETTING_FEEDBACK",
            PrintEngineState::Error => "ERROR",
            PrintEngineState::ShowingVersion => "SHOWING_VERSION",
            PrintEngineState::Registering => "REGISTERING",
            PrintEngineState::ConfirmUpgrade => "CONFIRM_UPGRADE",
            PrintEngineState::UpgradingProjector => "UPGRADING_PROJECTOR",
            PrintEngineState::UpgradeComplete => "UPGRADE_COMPLETE",
            PrintEngineState::DemoMode => "DEMO_MODE",
            PrintEngineState::ShowingTestPattern => "SHOWING_TEST_PATTERN",
        }
    }
}

impl fmt::Display for PrintEngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Front panel substate refining the main state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UiSubState {
    /// No refinement
    #[default]
    None,
    /// Home without print data
    NoPrintData,
    /// Home with print data ready to start
    HavePrintData,
    /// Print data is being loaded
    LoadingPrintData,
    /// Print data finished loading
    LoadedPrintData,
    /// Print data failed to load
    PrintDataLoadFailed,
    /// Last print was canceled
    PrintCanceled,
    /// Last print completed
    PrintCompleted,
    /// A print file was found on an attached USB drive
    UsbFileFound,
    /// An attached USB drive could not be used
    UsbDriveError,
    /// Printer registration finished
    Registered,
    /// Pause requested; will take effect after the current layer
    AboutToPause,
    /// Tray rotation jammed
    RotationJammed,
}

/// Which side of a transition a status snapshot describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StateChange {
    /// Not tied to a transition (UI substate or data change)
    #[default]
    NoChange,
    /// Entering the reported state
    Entering,
    /// Leaving the reported state
    Leaving,
}

/// User rating of the last print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrintRating {
    /// Not rated
    #[default]
    Unknown,
    /// User reported success
    Succeeded,
    /// User reported failure
    Failed,
}

/// Snapshot of the printer condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrinterStatus {
    /// Current leaf state
    pub state: PrintEngineState,
    /// Front panel substate
    pub ui_sub_state: UiSubState,
    /// Whether this snapshot marks entering or leaving `state`
    pub change: StateChange,
    /// Set when `error_code` describes a fatal error
    pub is_error: bool,
    /// Error being reported, if any
    pub error_code: Option<ErrorCode>,
    /// OS error number accompanying `error_code`
    pub errno: i32,
    /// 1-based layer being printed, 0 when idle
    pub current_layer: u32,
    /// Layer count of the loaded job
    pub num_layers: u32,
    /// Estimated seconds until the print finishes
    pub estimated_seconds_remaining: u32,
    /// Last measured temperature in degrees Celsius
    pub temperature: f64,
    /// Name of the loaded job
    pub job_name: String,
    /// Unique id of the loaded job
    pub job_id: String,
    /// Rating of the last print
    pub print_rating: PrintRating,
}

impl PrinterStatus {
    /// Create the boot-time status
    pub fn new() -> Self {
        Self {
            state: PrintEngineState::Initializing,
            ui_sub_state: UiSubState::None,
            change: StateChange::NoChange,
            is_error: false,
            error_code: None,
            errno: 0,
            current_layer: 0,
            num_layers: 0,
            estimated_seconds_remaining: 0,
            temperature: 0.0,
            job_name: String::new(),
            job_id: String::new(),
            print_rating: PrintRating::Unknown,
        }
    }

    /// Whether a job is loaded
    pub fn has_job(&self) -> bool {
        !self.job_id.is_empty()
    }

    /// Serialize for the network layer
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for PrinterStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {:?} layer {}/{} eta {}s temp {:.1}C",
            self.state,
            self.change,
            self.ui_sub_state,
            self.current_layer,
            self.num_layers,
            self.estimated_seconds_remaining,
            self.temperature
        )?;
        if let Some(code) = self.error_code {
            write!(f, " error: {} (errno {})", code, self.errno)?;
        }
        Ok(())
    }
}
