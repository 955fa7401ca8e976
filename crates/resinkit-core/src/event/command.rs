//! Host command surface
//!
//! Commands arrive as text lines from the network layer, the CLI pipe, or
//! simulated front panel input. Parsing is case-insensitive.

use std::fmt;
use std::str::FromStr;

/// Discrete commands accepted from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start printing the loaded job
    Start,
    /// Request cancellation of the current print
    Cancel,
    /// Pause for inspection after the current layer
    Pause,
    /// Resume from pause, jam, or calibration
    Resume,
    /// Reset the printer (re-initialize and home)
    Reset,
    /// Load staged print data
    ProcessPrintData,
    /// Apply a staged settings file
    ApplySettings,
    /// Re-read settings from storage
    RefreshSettings,
    /// Show the projector test pattern
    ShowTest,
    /// Show the projector calibration image
    ShowCalImage,
    /// Show the registration code
    StartRegistering,
    /// Registration completed on the server
    RegistrationSucceeded,
    /// Offer a projector firmware upgrade
    UpgradeProjector,
    /// Rebroadcast the current status
    GetStatus,
    /// Simulated left button press
    Button1,
    /// Simulated right button press
    Button2,
    /// Simulated left button hold
    Button1Hold,
    /// Simulated right button hold
    Button2Hold,
    /// Simulated press of both buttons
    Buttons1And2,
    /// Simulated hold of both buttons
    Buttons1And2Hold,
    /// Stop the reactor and exit
    Exit,
}

/// Error returned for unrecognized command text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl Command {
    /// Canonical text token
    pub fn token(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Cancel => "cancel",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Reset => "reset",
            Command::ProcessPrintData => "processprintdata",
            Command::ApplySettings => "applysettings",
            Command::RefreshSettings => "refreshsettings",
            Command::ShowTest => "test",
            Command::ShowCalImage => "calimage",
            Command::StartRegistering => "startregistering",
            Command::RegistrationSucceeded => "registrationsucceeded",
            Command::UpgradeProjector => "upgradeprojector",
            Command::GetStatus => "getstatus",
            Command::Button1 => "button1",
            Command::Button2 => "button2",
            Command::Button1Hold => "button1hold",
            Command::Button2Hold => "button2hold",
            Command::Buttons1And2 => "buttons1and2",
            Command::Buttons1And2Hold => "buttons1and2hold",
            Command::Exit => "exit",
        }
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = match s.trim().to_ascii_lowercase().as_str() {
            "start" | "startprint" => Command::Start,
            "cancel" => Command::Cancel,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "reset" => Command::Reset,
            "processprintdata" => Command::ProcessPrintData,
            "applysettings" => Command::ApplySettings,
            "refreshsettings" => Command::RefreshSettings,
            "test" | "showtest" => Command::ShowTest,
            "calimage" | "showcalimage" => Command::ShowCalImage,
            "startregistering" => Command::StartRegistering,
            "registrationsucceeded" => Command::RegistrationSucceeded,
            "upgradeprojector" => Command::UpgradeProjector,
            "getstatus" => Command::GetStatus,
            "button1" => Command::Button1,
            "button2" => Command::Button2,
            "button1hold" => Command::Button1Hold,
            "button2hold" => Command::Button2Hold,
            "buttons1and2" => Command::Buttons1And2,
            "buttons1and2hold" => Command::Buttons1And2Hold,
            "exit" | "quit" => Command::Exit,
            other => return Err(UnknownCommand(other.to_string())),
        };
        Ok(cmd)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
