//! Error handling for ResinKit
//!
//! Provides error types for all layers of the printer core:
//! - Hardware errors (I2C, GPIO, projector, thermometer)
//! - Motor controller errors
//! - Print data errors
//! - Reactor errors
//!
//! Failures that the printer reports to its observers are additionally
//! classified by [`ErrorCode`], which is what travels in `PrinterStatus`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hardware access error type
///
/// Raised by the narrow collaborator contracts (I2C devices, GPIO lines,
/// projector, thermometer).
#[derive(Error, Debug, Clone)]
pub enum HardwareError {
    /// Writing to an I2C device failed
    #[error("I2C write to device 0x{address:02X} failed: {reason}")]
    I2cWrite {
        /// The 7-bit device address.
        address: u8,
        /// The reason the write failed.
        reason: String,
    },

    /// Reading from an I2C device failed
    #[error("I2C read from device 0x{address:02X} failed: {reason}")]
    I2cRead {
        /// The 7-bit device address.
        address: u8,
        /// The reason the read failed.
        reason: String,
    },

    /// Device never reported ready
    #[error("Device 0x{address:02X} not ready after {attempts} attempts")]
    NotReady {
        /// The 7-bit device address.
        address: u8,
        /// How many polls were made.
        attempts: u32,
    },

    /// GPIO line error
    #[error("GPIO {pin} error: {reason}")]
    Gpio {
        /// The GPIO line number.
        pin: u32,
        /// The reason for the failure.
        reason: String,
    },

    /// Projector error
    #[error("Projector error: {reason}")]
    Projector {
        /// The reason for the projector failure.
        reason: String,
    },

    /// Thermometer error
    #[error("Thermometer error: {reason}")]
    Thermometer {
        /// The reason the temperature could not be read.
        reason: String,
    },
}

/// Motor controller error type
#[derive(Error, Debug, Clone)]
pub enum MotorError {
    /// A low-level command could not be delivered
    #[error("Motor command '{command}' could not be sent: {source}")]
    SendFailed {
        /// Description of the command being sent.
        command: String,
        /// The underlying hardware failure.
        #[source]
        source: HardwareError,
    },

    /// The controller reported a failure status
    #[error("Motor controller reported status 0x{status:02X}")]
    Status {
        /// The raw status byte.
        status: u8,
    },

    /// No completion arrived in time
    #[error("Motor command timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },
}

/// Print data error type
#[derive(Error, Debug, Clone)]
pub enum PrintDataError {
    /// The print data location does not exist
    #[error("Print data not found: {path}")]
    NotFound {
        /// The path that was searched.
        path: String,
    },

    /// The print data contains no layers
    #[error("Print data contains no layers")]
    NoLayers,

    /// A slice image is missing
    #[error("No image for layer {layer}")]
    MissingImage {
        /// The 1-based layer index.
        layer: u32,
    },

    /// A slice image could not be decoded
    #[error("Invalid image for layer {layer}: {reason}")]
    InvalidImage {
        /// The 1-based layer index.
        layer: u32,
        /// The decoder error.
        reason: String,
    },

    /// The per-layer settings table could not be parsed
    #[error("Invalid per-layer settings: {reason}")]
    InvalidLayerSettings {
        /// The parse error.
        reason: String,
    },

    /// Filesystem failure while reading print data
    #[error("Print data I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Reactor error type
#[derive(Error, Debug, Clone)]
pub enum ReactorError {
    /// A readiness notice referenced an unregistered resource
    #[error("Unknown resource token {token}")]
    UnknownResource {
        /// The token carried by the notice.
        token: usize,
    },

    /// A resource was already registered for this event kind
    #[error("A resource is already registered for {kind}")]
    AlreadyRegistered {
        /// The event kind name.
        kind: String,
    },

    /// A resource failed while producing payloads
    #[error("Reading {kind} resource failed: {reason}")]
    ResourceRead {
        /// The event kind name.
        kind: String,
        /// The reason the read failed.
        reason: String,
    },

    /// The resource has not been registered with a reactor yet
    #[error("Resource is not registered with a reactor")]
    NotAttached,

    /// The readiness channel was closed
    #[error("Readiness channel closed")]
    Closed,
}

/// Main error type for ResinKit
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Hardware error
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// Motor error
    #[error(transparent)]
    Motor(#[from] MotorError),

    /// Print data error
    #[error(transparent)]
    PrintData(#[from] PrintDataError),

    /// Reactor error
    #[error(transparent)]
    Reactor(#[from] ReactorError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a motor timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Motor(MotorError::Timeout { .. }))
    }

    /// Check if this is a hardware error
    pub fn is_hardware_error(&self) -> bool {
        matches!(self, Error::Hardware(_))
    }

    /// Raw OS error number, if the failure carries one
    pub fn errno(&self) -> i32 {
        match self {
            Error::Io(e) => e.raw_os_error().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

/// Printer error codes reported through `PrinterStatus`
///
/// Whether a given occurrence is fatal is decided by the caller that reports
/// it; the code only identifies what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Motor controller reported a failure
    MotorError,
    /// Motor command did not complete in time
    MotorTimeout,
    /// I2C communication with a device failed
    I2cCommunication,
    /// Front panel reported an error
    FrontPanelError,
    /// Front panel sent a button code we do not know
    UnknownFrontPanelButton,
    /// An event arrived that no state handles
    UnexpectedEvent,
    /// A host command arrived in a state that cannot act on it
    IllegalStateForCommand,
    /// A host command could not be parsed
    UnknownCommand,
    /// Measured temperature above the ceiling
    OverHeated,
    /// Temperature could not be read
    ThermometerError,
    /// No valid print data loaded
    NoValidPrintData,
    /// Slice image missing for the layer about to be exposed
    NoImageForLayer,
    /// Staged print data could not be loaded
    PrintDataLoad,
    /// Per-layer settings table is invalid
    InvalidPerLayerSettings,
    /// Settings file could not be loaded
    CantLoadSettings,
    /// Settings file could not be saved
    CantSaveSettings,
    /// Settings file supplied by the host could not be applied
    CantApplySettings,
    /// Projector failure
    ProjectorError,
    /// Projector firmware upgrade failed
    ProjectorUpgradeFailed,
}

impl ErrorCode {
    /// Human readable description used in logs and on the front panel
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::MotorError => "Motor controller error",
            ErrorCode::MotorTimeout => "Timeout waiting for motor response",
            ErrorCode::I2cCommunication => "I2C communication failure",
            ErrorCode::FrontPanelError => "Front panel error",
            ErrorCode::UnknownFrontPanelButton => "Unknown front panel button code",
            ErrorCode::UnexpectedEvent => "Unexpected event in current state",
            ErrorCode::IllegalStateForCommand => "Command not allowed in current state",
            ErrorCode::UnknownCommand => "Unknown host command",
            ErrorCode::OverHeated => "Printer temperature too high",
            ErrorCode::ThermometerError => "Unable to read temperature",
            ErrorCode::NoValidPrintData => "No valid print data",
            ErrorCode::NoImageForLayer => "No image for layer",
            ErrorCode::PrintDataLoad => "Unable to load print data",
            ErrorCode::InvalidPerLayerSettings => "Invalid per-layer settings",
            ErrorCode::CantLoadSettings => "Unable to load settings",
            ErrorCode::CantSaveSettings => "Unable to save settings",
            ErrorCode::CantApplySettings => "Unable to apply settings",
            ErrorCode::ProjectorError => "Projector error",
            ErrorCode::ProjectorUpgradeFailed => "Projector upgrade failed",
        }
    }
}

impl ErrorCode {
    /// Whether an occurrence during a print must end in the Error state
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ErrorCode::UnknownFrontPanelButton
                | ErrorCode::UnexpectedEvent
                | ErrorCode::IllegalStateForCommand
                | ErrorCode::UnknownCommand
                | ErrorCode::ThermometerError
                | ErrorCode::CantSaveSettings
                | ErrorCode::CantApplySettings
                | ErrorCode::InvalidPerLayerSettings
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_error_chain() {
        let err: Error = MotorError::SendFailed {
            command: "home".to_string(),
            source: HardwareError::I2cWrite {
                address: 0x10,
                reason: "nack".to_string(),
            },
        }
        .into();
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("home"));
    }

    #[test]
    fn test_timeout_detection() {
        let err: Error = MotorError::Timeout { timeout_ms: 1500 }.into();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Motor command timed out after 1500ms");
    }

    #[test]
    fn test_errno_from_io() {
        let err: Error = std::io::Error::from_raw_os_error(5).into();
        assert_eq!(err.errno(), 5);
        assert_eq!(Error::other("x").errno(), 0);
    }

    #[test]
    fn test_error_code_severity() {
        assert!(ErrorCode::MotorTimeout.is_fatal());
        assert!(ErrorCode::OverHeated.is_fatal());
        assert!(!ErrorCode::UnknownFrontPanelButton.is_fatal());
        assert!(!ErrorCode::UnknownCommand.is_fatal());
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::OverHeated.to_string(), "Printer temperature too high");
    }
}
