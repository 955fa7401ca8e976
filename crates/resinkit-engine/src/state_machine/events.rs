//! Events the printer state machine reacts to

use resinkit_communication::ButtonEvent;
use resinkit_core::Command;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrinterEvent {
    /// Motor controller and status were reset
    Initialized,
    DoorOpened,
    DoorClosed,
    Start,
    Cancel,
    Pause,
    Resume,
    Reset,
    /// The motor controller reported success for an awaited motion
    MotionCompleted,
    DelayEnded,
    ExposureEnded,
    /// Parameters for the next layer are in place
    LayerReady,
    Button1,
    Button1Hold,
    Button2,
    Button2Hold,
    Buttons1And2,
    Buttons1And2Hold,
    ShowTest,
    ShowCalImage,
    StartRegistering,
    RegistrationSucceeded,
    UpgradeProjector,
    UpgradeSucceeded,
    /// A fatal error is pending
    Fatal,
}

impl PrinterEvent {
    /// The event a host command maps to, if it maps to one
    ///
    /// Commands that act on settings, print data or the process are handled
    /// by the print engine itself and return `None`.
    pub fn from_command(command: Command) -> Option<Self> {
        let event = match command {
            Command::Start => PrinterEvent::Start,
            Command::Cancel => PrinterEvent::Cancel,
            Command::Pause => PrinterEvent::Pause,
            Command::Resume => PrinterEvent::Resume,
            Command::Reset => PrinterEvent::Reset,
            Command::ShowTest => PrinterEvent::ShowTest,
            Command::ShowCalImage => PrinterEvent::ShowCalImage,
            Command::StartRegistering => PrinterEvent::StartRegistering,
            Command::RegistrationSucceeded => PrinterEvent::RegistrationSucceeded,
            Command::UpgradeProjector => PrinterEvent::UpgradeProjector,
            Command::Button1 => PrinterEvent::Button1,
            Command::Button2 => PrinterEvent::Button2,
            Command::Button1Hold => PrinterEvent::Button1Hold,
            Command::Button2Hold => PrinterEvent::Button2Hold,
            Command::Buttons1And2 => PrinterEvent::Buttons1And2,
            Command::Buttons1And2Hold => PrinterEvent::Buttons1And2Hold,
            Command::ProcessPrintData
            | Command::ApplySettings
            | Command::RefreshSettings
            | Command::GetStatus
            | Command::Exit => return None,
        };
        Some(event)
    }

    pub fn is_button(&self) -> bool {
        matches!(
            self,
            PrinterEvent::Button1
                | PrinterEvent::Button1Hold
                | PrinterEvent::Button2
                | PrinterEvent::Button2Hold
                | PrinterEvent::Buttons1And2
                | PrinterEvent::Buttons1And2Hold
        )
    }

    pub fn is_button_hold(&self) -> bool {
        matches!(
            self,
            PrinterEvent::Button1Hold | PrinterEvent::Button2Hold | PrinterEvent::Buttons1And2Hold
        )
    }
}

impl From<ButtonEvent> for PrinterEvent {
    fn from(button: ButtonEvent) -> Self {
        match button {
            ButtonEvent::Button1 => PrinterEvent::Button1,
            ButtonEvent::Button1Hold => PrinterEvent::Button1Hold,
            ButtonEvent::Button2 => PrinterEvent::Button2,
            ButtonEvent::Button2Hold => PrinterEvent::Button2Hold,
            ButtonEvent::Buttons1And2 => PrinterEvent::Buttons1And2,
            ButtonEvent::Buttons1And2Hold => PrinterEvent::Buttons1And2Hold,
        }
    }
}

impl fmt::Display for PrinterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_mapping() {
        assert_eq!(PrinterEvent::from_command(Command::Start), Some(PrinterEvent::Start));
        assert_eq!(
            PrinterEvent::from_command(Command::Button2Hold),
            Some(PrinterEvent::Button2Hold)
        );
        assert_eq!(PrinterEvent::from_command(Command::ProcessPrintData), None);
        assert_eq!(PrinterEvent::from_command(Command::Exit), None);
    }

    #[test]
    fn test_button_classification() {
        assert!(PrinterEvent::from(ButtonEvent::Button1).is_button());
        assert!(PrinterEvent::Buttons1And2Hold.is_button_hold());
        assert!(!PrinterEvent::Button2.is_button_hold());
        assert!(!PrinterEvent::Start.is_button());
    }
}
