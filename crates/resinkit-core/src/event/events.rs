//! Reactor event kinds and payloads

use std::fmt;

/// Logical event sources multiplexed by the reactor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Front panel button interrupt; payload is the button register byte
    ButtonInterrupt,
    /// Motor controller interrupt; payload is the status register byte
    MotorInterrupt,
    /// Door switch edge; payload is the GPIO level byte
    DoorInterrupt,
    /// Resin tray rotation sensor edge
    RotationInterrupt,
    /// Delay timer expired
    DelayEnd,
    /// Exposure timer expired
    ExposureEnd,
    /// Motor completion timeout expired
    MotorTimeout,
    /// Periodic temperature measurement
    TemperatureTimer,
    /// USB drive mounted; payload is the mount path
    UsbDriveConnected,
    /// USB drive removed
    UsbDriveDisconnected,
    /// Text command from the host; payload is the command line
    HostCommand,
    /// Termination signal received
    Signal,
}

impl EventKind {
    /// All kinds, in a stable order
    pub const ALL: [EventKind; 12] = [
        EventKind::ButtonInterrupt,
        EventKind::MotorInterrupt,
        EventKind::DoorInterrupt,
        EventKind::RotationInterrupt,
        EventKind::DelayEnd,
        EventKind::ExposureEnd,
        EventKind::MotorTimeout,
        EventKind::TemperatureTimer,
        EventKind::UsbDriveConnected,
        EventKind::UsbDriveDisconnected,
        EventKind::HostCommand,
        EventKind::Signal,
    ];

    /// Timer driven kinds
    pub fn is_timer(&self) -> bool {
        matches!(
            self,
            EventKind::DelayEnd
                | EventKind::ExposureEnd
                | EventKind::MotorTimeout
                | EventKind::TemperatureTimer
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::ButtonInterrupt => "button interrupt",
            EventKind::MotorInterrupt => "motor interrupt",
            EventKind::DoorInterrupt => "door interrupt",
            EventKind::RotationInterrupt => "rotation interrupt",
            EventKind::DelayEnd => "delay end",
            EventKind::ExposureEnd => "exposure end",
            EventKind::MotorTimeout => "motor timeout",
            EventKind::TemperatureTimer => "temperature timer",
            EventKind::UsbDriveConnected => "USB drive connected",
            EventKind::UsbDriveDisconnected => "USB drive disconnected",
            EventKind::HostCommand => "host command",
            EventKind::Signal => "signal",
        };
        write!(f, "{}", name)
    }
}

/// Payload carried by a single event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    /// No payload
    None,
    /// A register or GPIO byte
    Byte(u8),
    /// A command line or path
    Text(String),
}

impl EventData {
    /// The byte payload, if any
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            EventData::Byte(b) => Some(*b),
            _ => None,
        }
    }

    /// The text payload, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EventData::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accessors() {
        assert_eq!(EventData::Byte(0x30).as_byte(), Some(0x30));
        assert_eq!(EventData::Byte(0x30).as_text(), None);
        assert_eq!(EventData::Text("start".into()).as_text(), Some("start"));
        assert_eq!(EventData::None.as_byte(), None);
    }

    #[test]
    fn test_timer_kinds() {
        let timers: Vec<_> = EventKind::ALL.iter().filter(|k| k.is_timer()).collect();
        assert_eq!(timers.len(), 4);
    }
}
