//! Front panel buttons
//!
//! The panel raises its interrupt line on a button event; the button register
//! then holds one code. The display side of the panel is driven elsewhere.

use crate::i2c::{wait_until_ready, I2cDevice, ReadyPolicy};
use resinkit_core::HardwareError;

/// I2C address of the front panel
pub const FRONT_PANEL_ADDRESS: u8 = 0x11;

/// Register holding the last button code
pub const BUTTON_REGISTER: u8 = 0x30;

/// Register reporting whether the panel can accept a command
pub const READY_REGISTER: u8 = 0x31;

/// Ready register value when the panel is idle
pub const PANEL_READY: u8 = 0x00;

/// Code reported when the panel has failed
pub const PANEL_ERROR: u8 = 0xFF;

/// Decoded button event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Left button
    Button1,
    Button1Hold,
    /// Right button
    Button2,
    Button2Hold,
    Buttons1And2,
    Buttons1And2Hold,
}

/// Outcome of decoding a button code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonCode {
    Button(ButtonEvent),
    /// The panel reported its own failure
    PanelError,
    /// A code we do not know
    Unknown(u8),
}

impl ButtonCode {
    pub fn decode(code: u8) -> Self {
        match code {
            0x01 => ButtonCode::Button(ButtonEvent::Button1),
            0x02 => ButtonCode::Button(ButtonEvent::Button1Hold),
            0x04 => ButtonCode::Button(ButtonEvent::Button2),
            0x08 => ButtonCode::Button(ButtonEvent::Button2Hold),
            0x10 => ButtonCode::Button(ButtonEvent::Buttons1And2),
            0x20 => ButtonCode::Button(ButtonEvent::Buttons1And2Hold),
            PANEL_ERROR => ButtonCode::PanelError,
            other => ButtonCode::Unknown(other),
        }
    }
}

impl ButtonEvent {
    /// Code the panel sends for this event
    pub fn code(&self) -> u8 {
        match self {
            ButtonEvent::Button1 => 0x01,
            ButtonEvent::Button1Hold => 0x02,
            ButtonEvent::Button2 => 0x04,
            ButtonEvent::Button2Hold => 0x08,
            ButtonEvent::Buttons1And2 => 0x10,
            ButtonEvent::Buttons1And2Hold => 0x20,
        }
    }
}

/// Front panel button reader
pub struct FrontPanel {
    device: Box<dyn I2cDevice>,
    ready: ReadyPolicy,
}

impl FrontPanel {
    pub fn new(device: Box<dyn I2cDevice>) -> Self {
        Self {
            device,
            ready: ReadyPolicy::default(),
        }
    }

    pub fn with_ready_policy(mut self, ready: ReadyPolicy) -> Self {
        self.ready = ready;
        self
    }

    /// Wait for the panel to become ready
    pub fn wait_ready(&mut self) -> Result<(), HardwareError> {
        wait_until_ready(self.device.as_mut(), READY_REGISTER, self.ready, |v| {
            v == PANEL_READY
        })
    }

    /// Read the pending button code
    pub fn read_button(&mut self) -> Result<u8, HardwareError> {
        self.device.read_register(BUTTON_REGISTER)
    }

    /// Whether both buttons are held, used for the boot-time demo override
    pub fn demo_override(&mut self) -> Result<bool, HardwareError> {
        let code = self.read_button()?;
        Ok(ButtonCode::decode(code) == ButtonCode::Button(ButtonEvent::Buttons1And2Hold))
    }
}
