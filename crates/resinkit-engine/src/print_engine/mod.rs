//! Print engine
//!
//! Subscribes to the reactor, turns raw events into state-machine events and
//! carries out the machine's actions. It is the only owner of the printer
//! status; observers get copies through the [`StatusBus`].

mod actions;
mod context;
mod hardware;

pub use hardware::{EngineTimers, PrinterHardware};

use self::context::EngineCore;
use crate::reactor::{Reactor, StopHandle};
use crate::state_machine::{BootConditions, PrinterEvent, PrinterStateMachine};
use resinkit_communication::motor::check_status;
use resinkit_communication::ButtonCode;
use resinkit_core::constants::{STAGED_SETTINGS_FILE, TEMPERATURE_MEASUREMENT_INTERVAL};
use resinkit_core::{
    Command, ErrorCode, EventData, EventKind, PrintEngineState, PrinterStatus, Shared,
    StateChange, StatusBus, UiSubState,
};
use resinkit_settings::SettingsStore;
use std::path::Path;
use std::sync::Arc;

pub struct PrintEngine {
    machine: PrinterStateMachine,
    core: EngineCore,
    stop: Option<StopHandle>,
}

impl PrintEngine {
    pub fn new(
        settings: SettingsStore,
        hardware: PrinterHardware,
        timers: EngineTimers,
        bus: Arc<StatusBus>,
    ) -> Self {
        Self {
            machine: PrinterStateMachine::new(),
            core: EngineCore::new(settings, hardware, timers, bus),
            stop: None,
        }
    }

    /// Handle used by the `Exit` command and termination signals
    pub fn set_stop_handle(&mut self, stop: StopHandle) {
        self.stop = Some(stop);
    }

    /// Start temperature monitoring and enter the initial state
    pub fn start(&mut self, boot: BootConditions) {
        self.core.read_temperature();
        if let Err(e) = self
            .core
            .timers
            .temperature
            .start_repeating(TEMPERATURE_MEASUREMENT_INTERVAL)
        {
            tracing::warn!("Temperature monitoring disabled: {}", e);
        }
        self.machine.start(boot, &mut self.core);
    }

    pub fn state(&self) -> PrintEngineState {
        self.machine.state()
    }

    pub fn status(&self) -> &PrinterStatus {
        &self.core.status
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.core.settings
    }

    pub fn unjam_tries_left(&self) -> u32 {
        self.machine.unjam_tries_left()
    }

    /// Subscribe `engine` to every event kind the reactor carries
    pub fn attach(engine: &Shared<PrintEngine>, reactor: &mut Reactor) {
        for kind in EventKind::ALL {
            let engine = engine.clone();
            reactor.subscribe(kind, move |data| engine.borrow_mut().handle_event(kind, data));
        }
        engine.borrow_mut().set_stop_handle(reactor.stop_handle());
    }

    fn fire(&mut self, event: PrinterEvent) {
        self.machine.handle(event, &mut self.core);
    }

    /// Let the machine handle anything the engine posted itself
    fn settle(&mut self) {
        self.machine.process_posted(&mut self.core);
    }

    // -------------------------------------------------------------------------
    // Event intake
    // -------------------------------------------------------------------------

    pub fn handle_event(&mut self, kind: EventKind, data: &EventData) {
        tracing::trace!("{} event {:?}", kind, data);
        match kind {
            EventKind::ButtonInterrupt => match data.as_byte() {
                Some(code) => self.button(code),
                None => tracing::warn!("Button interrupt without a code"),
            },
            EventKind::MotorInterrupt => match data.as_byte() {
                Some(status) => self.motor_status(status),
                None => tracing::warn!("Motor interrupt without a status"),
            },
            EventKind::DoorInterrupt => match data.as_byte() {
                Some(level) => {
                    let open = self.core.settings.read().door_is_open(level);
                    self.fire(if open {
                        PrinterEvent::DoorOpened
                    } else {
                        PrinterEvent::DoorClosed
                    });
                }
                None => tracing::warn!("Door interrupt without a level"),
            },
            EventKind::RotationInterrupt => {
                tracing::trace!("Rotation sensor pulse");
                self.core.rotation_detected = true;
            }
            EventKind::DelayEnd => self.fire(PrinterEvent::DelayEnded),
            EventKind::ExposureEnd => self.fire(PrinterEvent::ExposureEnded),
            EventKind::MotorTimeout => {
                let detail = match self.core.motor_timeout {
                    Some(timeout) => format!("no response after {:?}", timeout),
                    None => "no response".to_string(),
                };
                self.core.fatal(ErrorCode::MotorTimeout, &detail);
                self.settle();
            }
            EventKind::TemperatureTimer => {
                let printing = self.state().is_printing();
                self.core.check_temperature(printing);
                self.settle();
            }
            EventKind::UsbDriveConnected => match data.as_text() {
                Some(mount) => {
                    let state = self.state();
                    self.core.usb_connected(state, Path::new(mount));
                }
                None => tracing::warn!("USB attach without a mount point"),
            },
            EventKind::UsbDriveDisconnected => {
                let state = self.state();
                self.core.usb_disconnected(state);
            }
            EventKind::HostCommand => match data.as_text() {
                Some(text) => self.handle_command_text(text),
                None => tracing::warn!("Host command without text"),
            },
            EventKind::Signal => {
                tracing::info!("Received {}, shutting down", data.as_text().unwrap_or("signal"));
                self.stop_reactor();
            }
        }
    }

    fn button(&mut self, code: u8) {
        match ButtonCode::decode(code) {
            ButtonCode::Button(button) => {
                let event = PrinterEvent::from(button);
                // Right button loads print data found on a USB drive
                if event == PrinterEvent::Button2
                    && self.state() == PrintEngineState::Home
                    && self.core.status.ui_sub_state == UiSubState::UsbFileFound
                {
                    self.core.process_print_data();
                    return;
                }
                self.fire(event);
            }
            ButtonCode::PanelError => {
                self.core.fatal(ErrorCode::FrontPanelError, "front panel reported an error");
                self.settle();
            }
            ButtonCode::Unknown(code) => {
                tracing::warn!("{}: 0x{:02X}", ErrorCode::UnknownFrontPanelButton, code);
            }
        }
    }

    fn motor_status(&mut self, status: u8) {
        self.core.timers.motor_timeout.clear();
        self.core.motor_timeout = None;
        match check_status(status) {
            Ok(()) => self.fire(PrinterEvent::MotionCompleted),
            Err(e) => {
                self.core
                    .report_error(ErrorCode::MotorError, i32::from(status), &e.to_string(), true);
                self.settle();
            }
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    pub fn handle_command_text(&mut self, text: &str) {
        match text.parse::<Command>() {
            Ok(command) => self.handle_command(command),
            Err(e) => tracing::warn!("{}: {}", ErrorCode::UnknownCommand, e),
        }
    }

    pub fn handle_command(&mut self, command: Command) {
        tracing::debug!("Command: {}", command);
        if let Some(event) = PrinterEvent::from_command(command) {
            return self.fire(event);
        }
        let state = self.state();
        match command {
            Command::GetStatus => self.core.publish(StateChange::NoChange),
            Command::Exit => self.stop_reactor(),
            Command::ProcessPrintData | Command::ApplySettings | Command::RefreshSettings
                if state != PrintEngineState::Home =>
            {
                tracing::warn!("{}: {} in {}", ErrorCode::IllegalStateForCommand, command, state);
            }
            Command::ProcessPrintData => self.core.process_print_data(),
            Command::ApplySettings => {
                let staged = self.core.settings.read().staging_dir.join(STAGED_SETTINGS_FILE);
                if let Err(e) = self.core.settings.apply_from_file(&staged) {
                    self.core
                        .report_error(ErrorCode::CantApplySettings, 0, &e.to_string(), false);
                }
            }
            Command::RefreshSettings => match self.core.settings.refresh() {
                Ok(()) => tracing::info!("Settings reloaded"),
                Err(e) => {
                    self.core
                        .report_error(ErrorCode::CantLoadSettings, 0, &e.to_string(), false);
                }
            },
            other => tracing::warn!("{}: {}", ErrorCode::UnknownCommand, other),
        }
    }

    fn stop_reactor(&mut self) {
        match &self.stop {
            Some(stop) => stop.stop(),
            None => tracing::warn!("Stop requested but no reactor is attached"),
        }
    }
}
