//! Engine state shared by the event intake and the state-machine actions

use super::hardware::{EngineTimers, PrinterHardware};
use crate::print_data::{install_print_data, DirectoryPrintData, PrintData};
use crate::state_machine::PrinterEvent;
use crate::worker::{BackgroundWorker, ImageJob};
use resinkit_communication::HighLevelMotorCommand;
use resinkit_core::constants::USB_PRINT_DATA_DIR;
use resinkit_core::{
    ErrorCode, PrintEngineState, PrinterStatus, StateChange, StatusBus, UiSubState,
};
use resinkit_settings::{CurrentLayerSettings, PerLayerSettings, SettingsStore};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Fatal error waiting for the `Error` state to be entered
#[derive(Debug, Clone)]
pub(crate) struct PendingError {
    pub code: ErrorCode,
    pub errno: i32,
}

/// A timer stopped by a cancel request or an opened door
#[derive(Debug, Clone, Copy)]
pub(crate) enum PausedTimer {
    Delay(Duration),
    Exposure(Duration),
}

pub(crate) struct EngineCore {
    pub settings: SettingsStore,
    pub status: PrinterStatus,
    pub bus: Arc<StatusBus>,
    pub hardware: PrinterHardware,
    pub timers: EngineTimers,
    pub print_data: Option<Arc<dyn PrintData>>,
    pub per_layer: PerLayerSettings,
    pub layer: CurrentLayerSettings,
    pub worker: BackgroundWorker,
    pub rotation_detected: bool,
    pub pending_error: Option<PendingError>,
    pub posted: VecDeque<PrinterEvent>,
    /// Timeout of the motion in flight, re-armed when a paused motion resumes
    pub motor_timeout: Option<Duration>,
    pub paused_timer: Option<PausedTimer>,
    /// Print directory found on an attached USB drive
    pub usb_print_dir: Option<PathBuf>,
}

impl EngineCore {
    pub fn new(
        settings: SettingsStore,
        hardware: PrinterHardware,
        timers: EngineTimers,
        bus: Arc<StatusBus>,
    ) -> Self {
        let layer = CurrentLayerSettings::idle(&settings.read());
        let mut core = Self {
            settings,
            status: PrinterStatus::new(),
            bus,
            hardware,
            timers,
            print_data: None,
            per_layer: PerLayerSettings::default(),
            layer,
            worker: BackgroundWorker::new(),
            rotation_detected: false,
            pending_error: None,
            posted: VecDeque::new(),
            motor_timeout: None,
            paused_timer: None,
            usb_print_dir: None,
        };
        core.load_installed_print_data();
        core
    }

    /// Pick up print data left installed by a previous run
    fn load_installed_print_data(&mut self) {
        let (dir, job_name, job_id) = {
            let settings = self.settings.read();
            (
                settings.print_data_dir.clone(),
                settings.job_name.clone(),
                settings.job_id.clone(),
            )
        };
        let data = match DirectoryPrintData::open(&dir) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("No installed print data: {}", e);
                return;
            }
        };
        if let Err(e) = data.validate() {
            tracing::warn!("Ignoring installed print data in {}: {}", dir.display(), e);
            return;
        }
        self.status.num_layers = data.layer_count();
        self.status.job_name = if job_name.is_empty() { data.job_name() } else { job_name };
        self.status.job_id = if job_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            job_id
        };
        tracing::info!(
            "Loaded print data '{}' with {} layers",
            self.status.job_name,
            self.status.num_layers
        );
        self.print_data = Some(Arc::new(data));
    }

    // -------------------------------------------------------------------------
    // Status and errors
    // -------------------------------------------------------------------------

    pub fn publish(&mut self, change: StateChange) {
        self.status.change = change;
        tracing::debug!("Status: {}", self.status);
        self.bus.publish(&self.status);
        self.status.change = StateChange::NoChange;
    }

    /// Report a failure
    ///
    /// A fatal error is logged with the full status and settings and left
    /// pending for the state machine, which enters `Error`. A non-fatal one is
    /// broadcast once with its code and then cleared.
    pub fn report_error(&mut self, code: ErrorCode, errno: i32, detail: &str, fatal: bool) {
        if fatal {
            tracing::error!("{} (errno {}): {}", code, errno, detail);
            match self.status.to_json() {
                Ok(json) => tracing::error!("Status at failure: {}", json),
                Err(e) => tracing::error!("Status at failure unavailable: {}", e),
            }
            match self.settings.to_json() {
                Ok(json) => tracing::error!("Settings at failure: {}", json),
                Err(e) => tracing::error!("Settings at failure unavailable: {}", e),
            }
            self.pending_error = Some(PendingError { code, errno });
            self.posted.push_back(PrinterEvent::Fatal);
        } else {
            tracing::warn!("{} (errno {}): {}", code, errno, detail);
            self.status.error_code = Some(code);
            self.status.errno = errno;
            self.publish(StateChange::NoChange);
            self.status.error_code = None;
            self.status.errno = 0;
        }
    }

    pub fn fatal(&mut self, code: ErrorCode, detail: &str) {
        self.report_error(code, 0, detail, true);
    }

    fn save_settings(&self) {
        if self.settings.path().is_none() {
            return;
        }
        if let Err(e) = self.settings.save() {
            tracing::warn!("{}: {}", ErrorCode::CantSaveSettings, e);
        }
    }

    // -------------------------------------------------------------------------
    // Motion and timers
    // -------------------------------------------------------------------------

    pub fn motor_timeout_for(&self, command: HighLevelMotorCommand) -> Duration {
        let settings = self.settings.read();
        let seconds = (command.motion_seconds(&self.layer) * settings.motor_timeout_factor)
            .max(settings.min_motor_timeout_sec);
        duration_from_secs(seconds)
    }

    /// Start a timer, posting `fallback` if it cannot run
    pub fn start_timer(&mut self, which: TimerKind, delay: Duration, fallback: PrinterEvent) {
        if delay.is_zero() {
            self.posted.push_back(fallback);
            return;
        }
        let timer = match which {
            TimerKind::Delay => &self.timers.delay,
            TimerKind::Exposure => &self.timers.exposure,
        };
        if let Err(e) = timer.start(delay) {
            tracing::error!("Cannot start {:?} timer: {}", which, e);
            self.posted.push_back(fallback);
        }
    }

    // -------------------------------------------------------------------------
    // Print job
    // -------------------------------------------------------------------------

    /// Read the thermometer into the status
    pub fn read_temperature(&mut self) -> Option<f64> {
        match self.hardware.thermometer.read_celsius() {
            Ok(celsius) => {
                self.status.temperature = celsius;
                Some(celsius)
            }
            Err(e) => {
                tracing::warn!("{}: {}", ErrorCode::ThermometerError, e);
                None
            }
        }
    }

    /// Periodic temperature check; overheating while printing is fatal
    pub fn check_temperature(&mut self, printing: bool) {
        let Some(celsius) = self.read_temperature() else {
            return;
        };
        let max = self.settings.read().max_temperature_c;
        tracing::trace!("Temperature {:.1}C", celsius);
        if printing && celsius > max {
            self.fatal(
                ErrorCode::OverHeated,
                &format!("{:.1}C exceeds the {:.1}C limit", celsius, max),
            );
        }
    }

    pub fn log_temperature_milestone(&mut self) {
        let layer = self.status.current_layer;
        if !is_temperature_milestone(layer, self.status.num_layers) {
            return;
        }
        if let Some(celsius) = self.read_temperature() {
            tracing::info!("Temperature at layer {}: {:.1}C", layer, celsius);
        }
    }

    /// Start preparing the image of a layer in the background
    pub fn start_image_job(&mut self, layer: u32) {
        let Some(print_data) = self.print_data.clone() else {
            self.fatal(ErrorCode::NoValidPrintData, "print data disappeared mid-print");
            return;
        };
        let (scale, pattern_mode) = {
            let settings = self.settings.read();
            (settings.image_scale_factor, settings.use_pattern_mode)
        };
        let job = ImageJob {
            layer,
            print_data,
            scale,
            pattern_mode,
            slot: self.hardware.projector.pending_slot(),
        };
        if let Err(e) = self.worker.start(job) {
            self.fatal(ErrorCode::PrintDataLoad, &format!("cannot start image worker: {}", e));
        }
    }

    // -------------------------------------------------------------------------
    // Print data loading and USB drives
    // -------------------------------------------------------------------------

    /// Install print data from an attached drive or the staging directory
    pub fn process_print_data(&mut self) {
        let (staging, target) = {
            let settings = self.settings.read();
            (settings.staging_dir.clone(), settings.print_data_dir.clone())
        };
        let source = self.usb_print_dir.take().unwrap_or(staging);
        tracing::info!("Loading print data from {}", source.display());

        self.status.ui_sub_state = UiSubState::LoadingPrintData;
        self.publish(StateChange::NoChange);

        if let Some(Err(e)) = self.worker.await_completion() {
            tracing::debug!("Ignoring image job failure before reload: {}", e);
        }
        match install_print_data(&source, &target) {
            Ok(data) => {
                match data.print_settings_text() {
                    Ok(Some(text)) => {
                        if let Err(e) = self.settings.apply_json(&text) {
                            tracing::warn!("{}: {}", ErrorCode::CantApplySettings, e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("{}: {}", ErrorCode::CantApplySettings, e),
                }
                let job_name = data.job_name();
                let job_id = uuid::Uuid::new_v4().to_string();
                if let Err(e) = self.settings.update(|s| {
                    s.job_name = job_name.clone();
                    s.job_id = job_id.clone();
                }) {
                    tracing::warn!("Cannot record job identity: {}", e);
                }
                self.save_settings();

                tracing::info!("Loaded job '{}' ({}), {} layers", job_name, job_id, data.layer_count());
                self.status.job_name = job_name;
                self.status.job_id = job_id;
                self.status.num_layers = data.layer_count();
                self.print_data = Some(Arc::new(data));
                self.status.ui_sub_state = UiSubState::LoadedPrintData;
                self.publish(StateChange::NoChange);
            }
            Err(e) => {
                // The old data may have been removed before the failure
                self.print_data = DirectoryPrintData::open(&target)
                    .ok()
                    .filter(|data| data.validate().is_ok())
                    .map(|data| Arc::new(data) as Arc<dyn PrintData>);
                if self.print_data.is_none() {
                    self.status.num_layers = 0;
                }
                self.status.ui_sub_state = UiSubState::PrintDataLoadFailed;
                self.report_error(ErrorCode::PrintDataLoad, 0, &e.to_string(), false);
            }
        }
    }

    pub fn usb_connected(&mut self, state: PrintEngineState, mount: &Path) {
        let dir = mount.join(USB_PRINT_DATA_DIR);
        let found = DirectoryPrintData::open(&dir)
            .map(|data| data.validate().is_ok())
            .unwrap_or(false);
        tracing::info!("USB drive at {}: print data {}", mount.display(), if found { "found" } else { "not found" });
        self.usb_print_dir = found.then_some(dir);
        if state == PrintEngineState::Home {
            self.status.ui_sub_state = if found {
                UiSubState::UsbFileFound
            } else {
                UiSubState::UsbDriveError
            };
            self.publish(StateChange::NoChange);
        }
    }

    pub fn usb_disconnected(&mut self, state: PrintEngineState) {
        tracing::info!("USB drive removed");
        self.usb_print_dir = None;
        let showing_usb = matches!(
            self.status.ui_sub_state,
            UiSubState::UsbFileFound | UiSubState::UsbDriveError
        );
        if state == PrintEngineState::Home && showing_usb {
            self.status.ui_sub_state = if self.print_data.is_some() {
                UiSubState::HavePrintData
            } else {
                UiSubState::NoPrintData
            };
            self.publish(StateChange::NoChange);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum TimerKind {
    Delay,
    Exposure,
}

/// Seconds to a duration; negative and non-finite values give zero
pub(crate) fn duration_from_secs(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::ZERO)
}

/// First and last layer, and each quarter of the way through
pub(crate) fn is_temperature_milestone(layer: u32, num_layers: u32) -> bool {
    if layer == 0 || num_layers == 0 {
        return false;
    }
    if layer == 1 || layer == num_layers {
        return true;
    }
    num_layers >= 4 && (1..=3).any(|quarter| layer == num_layers * quarter / 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_milestones() {
        let logged: Vec<u32> = (1..=100).filter(|&l| is_temperature_milestone(l, 100)).collect();
        assert_eq!(logged, vec![1, 25, 50, 75, 100]);
        assert!(is_temperature_milestone(1, 1));
        assert!(!is_temperature_milestone(0, 10));
        assert_eq!((1..=3).filter(|&l| is_temperature_milestone(l, 3)).count(), 2);
    }

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(duration_from_secs(1.5), Duration::from_millis(1500));
        assert_eq!(duration_from_secs(-2.0), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
    }
}
