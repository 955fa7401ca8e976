//! State-machine actions carried out by the engine

use super::context::{duration_from_secs, EngineCore, PausedTimer, TimerKind};
use crate::state_machine::{Pattern, PrintOutcome, PrinterActions, PrinterEvent};
use resinkit_communication::HighLevelMotorCommand;
use resinkit_core::{
    ErrorCode, MotorError, PrintEngineState, PrintRating, StateChange, UiSubState,
};
use resinkit_settings::{estimate_remaining_seconds, CurrentLayerSettings, PerLayerSettings};

impl EngineCore {
    fn motor_failure(&mut self, error: MotorError) {
        let code = match error {
            MotorError::SendFailed { .. } => ErrorCode::I2cCommunication,
            MotorError::Timeout { .. } => ErrorCode::MotorTimeout,
            MotorError::Status { .. } => ErrorCode::MotorError,
        };
        self.fatal(code, &error.to_string());
    }

    fn projector_failure(&mut self, code: ErrorCode, error: impl std::fmt::Display) {
        self.fatal(code, &error.to_string());
    }
}

impl PrinterActions for EngineCore {
    fn post(&mut self, event: PrinterEvent) {
        self.posted.push_back(event);
    }

    fn take_posted(&mut self) -> Option<PrinterEvent> {
        self.posted.pop_front()
    }

    fn broadcast(&mut self, state: PrintEngineState, change: StateChange) {
        self.status.state = state;
        self.publish(change);
    }

    fn set_ui_sub_state(&mut self, sub_state: UiSubState) {
        self.status.ui_sub_state = sub_state;
    }

    fn apply_pending_error(&mut self) {
        self.status.is_error = true;
        if let Some(pending) = self.pending_error.take() {
            self.status.error_code = Some(pending.code);
            self.status.errno = pending.errno;
        }
    }

    fn clear_error(&mut self) {
        self.status.is_error = false;
        self.status.error_code = None;
        self.status.errno = 0;
    }

    fn initialize_motors(&mut self) -> bool {
        self.status.current_layer = 0;
        self.status.estimated_seconds_remaining = 0;
        self.layer = CurrentLayerSettings::idle(&self.settings.read());
        self.send_motor_command(HighLevelMotorCommand::Initialize)
    }

    fn send_motor_command(&mut self, command: HighLevelMotorCommand) -> bool {
        self.timers.motor_timeout.clear();
        self.motor_timeout = None;
        if let Err(e) = self.hardware.motor.send(command, &self.layer) {
            self.motor_failure(e);
            return false;
        }
        if command.awaits_completion() {
            let timeout = self.motor_timeout_for(command);
            tracing::debug!("Awaiting {} within {:?}", command, timeout);
            self.motor_timeout = Some(timeout);
            if let Err(e) = self.timers.motor_timeout.start(timeout) {
                tracing::warn!("Motor timeout not armed: {}", e);
            }
        }
        true
    }

    fn pause_motion(&mut self) {
        self.timers.motor_timeout.clear();
        if let Err(e) = self.hardware.motor.send(HighLevelMotorCommand::Pause, &self.layer) {
            self.motor_failure(e);
        }
    }

    fn resume_motion(&mut self) {
        if let Err(e) = self.hardware.motor.send(HighLevelMotorCommand::Resume, &self.layer) {
            self.motor_failure(e);
            return;
        }
        if let Some(timeout) = self.motor_timeout {
            if let Err(e) = self.timers.motor_timeout.start(timeout) {
                tracing::warn!("Motor timeout not re-armed: {}", e);
            }
        }
    }

    fn clear_pending_motion(&mut self) {
        self.timers.motor_timeout.clear();
        self.motor_timeout = None;
        if let Err(e) = self.hardware.motor.send(HighLevelMotorCommand::ClearPending, &self.layer) {
            tracing::warn!("Could not clear pending motor commands: {}", e);
        }
    }

    fn start_delay(&mut self, seconds: f64) {
        self.start_timer(TimerKind::Delay, duration_from_secs(seconds), PrinterEvent::DelayEnded);
    }

    fn start_exposure(&mut self) {
        if let Some(Err(e)) = self.worker.await_completion() {
            self.fatal(ErrorCode::NoImageForLayer, &e.to_string());
            return;
        }
        match self.hardware.projector.show_pending() {
            Ok(true) => {}
            Ok(false) => {
                let detail = format!("layer {}", self.status.current_layer);
                self.fatal(ErrorCode::NoImageForLayer, &detail);
                return;
            }
            Err(e) => {
                self.projector_failure(ErrorCode::ProjectorError, e);
                return;
            }
        }
        let seconds = self.layer.params.exposure_sec;
        tracing::debug!("Exposing layer {} for {:.2}s", self.status.current_layer, seconds);
        self.start_timer(
            TimerKind::Exposure,
            duration_from_secs(seconds),
            PrinterEvent::ExposureEnded,
        );
    }

    fn end_exposure(&mut self) {
        self.timers.exposure.clear();
        if let Err(e) = self.hardware.projector.show_black() {
            self.projector_failure(ErrorCode::ProjectorError, e);
        }
    }

    fn pause_timers(&mut self) {
        if let Some(remaining) = self.timers.delay.clear() {
            self.paused_timer = Some(PausedTimer::Delay(remaining));
        }
        if let Some(remaining) = self.timers.exposure.clear() {
            self.paused_timer = Some(PausedTimer::Exposure(remaining));
        }
    }

    fn resume_timers(&mut self, state: PrintEngineState) {
        let paused = self.paused_timer.take();
        if state == PrintEngineState::Exposing {
            let remaining = match paused {
                Some(PausedTimer::Exposure(remaining)) => remaining,
                _ => std::time::Duration::ZERO,
            };
            if !remaining.is_zero() {
                match self.hardware.projector.show_current() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.fatal(ErrorCode::NoImageForLayer, "no image to resume exposure");
                        return;
                    }
                    Err(e) => {
                        self.projector_failure(ErrorCode::ProjectorError, e);
                        return;
                    }
                }
            }
            tracing::debug!("Resuming exposure for {:?}", remaining);
            self.start_timer(TimerKind::Exposure, remaining, PrinterEvent::ExposureEnded);
        } else {
            let remaining = match paused {
                Some(PausedTimer::Delay(remaining)) => remaining,
                _ => std::time::Duration::ZERO,
            };
            tracing::debug!("Resuming delay for {:?}", remaining);
            self.start_timer(TimerKind::Delay, remaining, PrinterEvent::DelayEnded);
        }
    }

    fn show_pattern(&mut self, pattern: Pattern) {
        let result = match pattern {
            Pattern::Test => self.hardware.projector.show_test_pattern(),
            Pattern::Calibration => self.hardware.projector.show_calibration_pattern(),
        };
        if let Err(e) = result {
            self.projector_failure(ErrorCode::ProjectorError, e);
        }
    }

    fn projector_off(&mut self) {
        if let Err(e) = self.hardware.projector.show_black() {
            self.projector_failure(ErrorCode::ProjectorError, e);
        }
    }

    fn upgrade_projector(&mut self) -> bool {
        tracing::info!("Upgrading projector firmware");
        match self.hardware.projector.upgrade_firmware() {
            Ok(()) => true,
            Err(e) => {
                self.projector_failure(ErrorCode::ProjectorUpgradeFailed, e);
                false
            }
        }
    }

    fn has_print_data(&self) -> bool {
        self.print_data.is_some()
    }

    fn try_start_print(&mut self) -> bool {
        let Some(data) = self.print_data.clone() else {
            self.report_error(ErrorCode::NoValidPrintData, 0, "no print data loaded", false);
            return false;
        };
        if let Err(e) = data.validate() {
            self.report_error(ErrorCode::NoValidPrintData, 0, &e.to_string(), false);
            return false;
        }
        if let Some(celsius) = self.read_temperature() {
            let max = self.settings.read().max_temperature_c;
            if celsius > max {
                let detail = format!("{:.1}C exceeds the {:.1}C limit", celsius, max);
                self.report_error(ErrorCode::OverHeated, 0, &detail, false);
                return false;
            }
        }
        let per_layer = match data.layer_settings_text() {
            Ok(Some(text)) => match PerLayerSettings::from_json(&text) {
                Ok(table) => table,
                Err(e) => {
                    self.report_error(ErrorCode::InvalidPerLayerSettings, 0, &e.to_string(), false);
                    return false;
                }
            },
            Ok(None) => PerLayerSettings::default(),
            Err(e) => {
                self.report_error(ErrorCode::InvalidPerLayerSettings, 0, &e.to_string(), false);
                return false;
            }
        };

        self.per_layer = per_layer;
        self.paused_timer = None;
        self.hardware.projector.clear_images();
        self.status.num_layers = data.layer_count();
        self.status.current_layer = 0;
        self.status.print_rating = PrintRating::Unknown;
        let settings = self.settings.get();
        self.layer = CurrentLayerSettings::idle(&settings);
        self.status.estimated_seconds_remaining =
            estimate_remaining_seconds(&settings, 1, self.status.num_layers).round() as u32;
        tracing::info!(
            "Starting print of '{}' with {} layers",
            self.status.job_name,
            self.status.num_layers
        );
        self.start_image_job(1);
        true
    }

    fn next_layer(&mut self) {
        self.status.current_layer += 1;
        let layer = self.status.current_layer;
        let settings = self.settings.get();
        self.layer = CurrentLayerSettings::for_layer(&settings, layer, &self.per_layer);
        self.status.estimated_seconds_remaining =
            estimate_remaining_seconds(&settings, layer, self.status.num_layers).round() as u32;
        tracing::info!(
            "Layer {}/{} ({}), about {}s remaining",
            layer,
            self.status.num_layers,
            self.layer.layer_type,
            self.status.estimated_seconds_remaining
        );
        self.log_temperature_milestone();
    }

    fn has_more_layers(&self) -> bool {
        self.status.current_layer < self.status.num_layers
    }

    fn layer_settings(&self) -> &CurrentLayerSettings {
        &self.layer
    }

    fn load_next_layer_image(&mut self) {
        let next = self.status.current_layer + 1;
        if next <= self.status.num_layers {
            self.start_image_job(next);
        }
    }

    fn clear_rotation_flag(&mut self) {
        self.rotation_detected = false;
    }

    fn rotation_detected(&self) -> bool {
        self.rotation_detected
    }

    fn jam_detection_enabled(&self) -> bool {
        self.settings.read().jam_detection_enabled()
    }

    fn max_unjam_tries(&self) -> u32 {
        self.settings.read().max_unjam_tries
    }

    fn calibrate_before_print(&self) -> bool {
        self.settings.read().calibrate_before_print
    }

    fn collects_feedback(&self) -> bool {
        let settings = self.settings.read();
        settings.registered && settings.collect_print_feedback
    }

    fn set_print_rating(&mut self, rating: PrintRating) {
        tracing::info!("Print rated {:?}", rating);
        self.status.print_rating = rating;
    }

    fn clear_print(&mut self, outcome: PrintOutcome) {
        if let Some(Err(e)) = self.worker.await_completion() {
            tracing::debug!("Ignoring image job failure of cleared print: {}", e);
        }
        self.timers.clear_print_timers();
        self.motor_timeout = None;
        self.paused_timer = None;
        self.hardware.projector.clear_images();
        self.per_layer.clear();
        if self.status.current_layer > 0 {
            tracing::info!(
                "Print {:?} at layer {}/{}",
                outcome,
                self.status.current_layer,
                self.status.num_layers
            );
        }
        self.status.current_layer = 0;
        self.status.estimated_seconds_remaining = 0;
        self.layer = CurrentLayerSettings::idle(&self.settings.read());
    }

    fn set_registered(&mut self) {
        if let Err(e) = self.settings.update(|s| s.registered = true) {
            tracing::warn!("Cannot record registration: {}", e);
            return;
        }
        if self.settings.path().is_some() {
            if let Err(e) = self.settings.save() {
                tracing::warn!("{}: {}", ErrorCode::CantSaveSettings, e);
            }
        }
    }
}
