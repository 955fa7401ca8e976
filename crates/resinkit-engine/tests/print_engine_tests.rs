use image::{GrayImage, Luma};
use parking_lot::Mutex;
use proptest::prelude::*;
use resinkit_communication::{
    Motor, ProjectedFrame, Projector, SimulatedI2cDevice, SimulatedProjector,
    SimulatedThermometer, MOTOR_ADDRESS,
};
use resinkit_core::{
    Command, ErrorCode, EventData, EventKind, PrintEngineState, PrinterStatus, StateChange,
    StatusBus, StatusFilter, UiSubState,
};
use resinkit_engine::{BootConditions, EngineTimers, PrintEngine, PrinterHardware, Reactor};
use resinkit_settings::{estimate_remaining_seconds, Settings, SettingsStore};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use PrintEngineState as S;

const BUTTON1: u8 = 0x01;
const BUTTON2: u8 = 0x04;

fn write_job(dir: &Path, layers: u32) {
    std::fs::create_dir_all(dir).unwrap();
    for layer in 1..=layers {
        let mut image = GrayImage::new(8, 8);
        image.put_pixel(layer % 8, 0, Luma([255]));
        image.save(dir.join(format!("slice_{}.png", layer))).unwrap();
    }
}

struct Rig {
    engine: PrintEngine,
    timers: EngineTimers,
    projector: SimulatedProjector,
    thermometer: SimulatedThermometer,
    statuses: Arc<Mutex<Vec<PrinterStatus>>>,
    dir: TempDir,
    _reactor: Reactor,
}

impl Rig {
    fn new(layers: u32, tweak: impl FnOnce(&mut Settings)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings {
            print_data_dir: dir.path().join("current"),
            staging_dir: dir.path().join("staging"),
            max_unjam_tries: 2,
            ..Settings::default()
        };
        tweak(&mut settings);
        if layers > 0 {
            write_job(&settings.print_data_dir, layers);
        }

        let mut reactor = Reactor::new().unwrap();
        let timers = EngineTimers::register(&mut reactor).unwrap();
        let motor_device = SimulatedI2cDevice::new(MOTOR_ADDRESS);
        let projector = SimulatedProjector::new();
        let thermometer = SimulatedThermometer::new(25.0);
        let hardware = PrinterHardware {
            motor: Motor::new(Box::new(motor_device)),
            projector: Projector::new(Box::new(projector.clone())),
            thermometer: Box::new(thermometer.clone()),
        };

        let bus = Arc::new(StatusBus::new());
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        bus.subscribe(StatusFilter::All, move |status| sink.lock().push(status));

        let engine = PrintEngine::new(
            SettingsStore::in_memory(settings),
            hardware,
            timers.clone(),
            bus,
        );
        Self {
            engine,
            timers,
            projector,
            thermometer,
            statuses,
            dir,
            _reactor: reactor,
        }
    }

    /// Boot and complete homing
    fn booted(layers: u32, tweak: impl FnOnce(&mut Settings)) -> Self {
        let mut rig = Self::new(layers, tweak);
        rig.engine.start(BootConditions::default());
        assert_eq!(rig.state(), S::Homing);
        rig.motor_done();
        assert_eq!(rig.state(), S::Home);
        rig
    }

    fn state(&self) -> PrintEngineState {
        self.engine.state()
    }

    fn event(&mut self, kind: EventKind, data: EventData) {
        self.engine.handle_event(kind, &data);
    }

    fn motor_done(&mut self) {
        self.event(EventKind::MotorInterrupt, EventData::Byte(0));
    }

    fn rotation(&mut self) {
        self.event(EventKind::RotationInterrupt, EventData::None);
    }

    fn button(&mut self, code: u8) {
        self.event(EventKind::ButtonInterrupt, EventData::Byte(code));
    }

    fn command(&mut self, command: Command) {
        self.engine.handle_command(command);
    }

    fn door(&mut self, open: bool) {
        let level = if open { b'1' } else { b'0' };
        self.event(EventKind::DoorInterrupt, EventData::Byte(level));
    }

    /// Take one step toward `Home`, canceling any print in progress
    fn drain_step(&mut self) {
        match self.state() {
            S::Home => {}
            S::DoorOpen => self.door(false),
            S::ConfirmCancel => self.command(Command::Cancel),
            S::AwaitingCancelation | S::Homing => self.motor_done(),
            s if s.is_printing() => self.command(Command::Cancel),
            _ => self.button(BUTTON1),
        }
    }

    fn exposure_end(&mut self) {
        self.event(EventKind::ExposureEnd, EventData::None);
    }

    /// From `Home`, start a print and stop at the first exposure
    fn start_to_exposure(&mut self) {
        self.command(Command::Start);
        assert_eq!(self.state(), S::MovingToStartPosition);
        self.motor_done();
        assert_eq!(self.state(), S::Calibrating);
        self.button(BUTTON2);
        assert_eq!(self.state(), S::Exposing);
    }

    /// From `Exposing`, finish the layer's exposure and separation
    fn separate_cleanly(&mut self) {
        self.exposure_end();
        assert_eq!(self.state(), S::Separating);
        self.rotation();
        self.motor_done();
        assert_eq!(self.state(), S::Approaching);
    }

    fn entered(&self) -> Vec<PrintEngineState> {
        self.statuses
            .lock()
            .iter()
            .filter(|s| s.change == StateChange::Entering)
            .map(|s| s.state)
            .collect()
    }

    fn any_fatal(&self) -> bool {
        self.statuses.lock().iter().any(|s| s.is_error)
    }

    fn reported(&self, code: ErrorCode) -> bool {
        self.statuses
            .lock()
            .iter()
            .any(|s| s.error_code == Some(code))
    }
}

#[test]
fn test_boot_loads_installed_job() {
    let rig = Rig::booted(3, |_| {});
    let status = rig.engine.status();
    assert_eq!(status.num_layers, 3);
    assert_eq!(status.job_name, "current");
    assert!(!status.job_id.is_empty());
    assert_eq!(status.ui_sub_state, UiSubState::HavePrintData);
    assert_eq!(rig.entered(), vec![S::Initializing, S::Homing, S::Home]);
}

#[test]
fn test_boot_without_job() {
    let rig = Rig::booted(0, |_| {});
    assert_eq!(rig.engine.status().ui_sub_state, UiSubState::NoPrintData);
    assert_eq!(rig.engine.status().num_layers, 0);
}

#[test]
fn test_two_layer_print_end_to_end() {
    let mut rig = Rig::booted(2, |_| {});
    rig.start_to_exposure();
    assert_eq!(rig.engine.status().current_layer, 1);
    assert!(rig.timers.exposure.is_armed());
    assert!(matches!(
        rig.projector.last_frame(),
        Some(ProjectedFrame::Image { width: 8, height: 8, .. })
    ));

    rig.separate_cleanly();
    assert_eq!(rig.projector.frames().iter().filter(|f| **f == ProjectedFrame::Black).count(), 1);
    rig.motor_done();
    assert_eq!(rig.state(), S::Exposing);
    assert_eq!(rig.engine.status().current_layer, 2);

    rig.separate_cleanly();
    rig.motor_done();
    assert_eq!(rig.state(), S::Homing);
    rig.motor_done();
    assert_eq!(rig.state(), S::Home);

    let status = rig.engine.status();
    assert_eq!(status.ui_sub_state, UiSubState::PrintCompleted);
    assert_eq!(status.current_layer, 0);
    assert_eq!(status.estimated_seconds_remaining, 0);
    assert!(!rig.any_fatal());
    assert!(!rig.timers.exposure.is_armed());

    let entered = rig.entered();
    let exposures = entered.iter().filter(|s| **s == S::Exposing).count();
    assert_eq!(exposures, 2);
}

#[test]
fn test_print_without_calibration_skips_prompt() {
    let mut rig = Rig::booted(1, |s| s.calibrate_before_print = false);
    rig.command(Command::Start);
    rig.motor_done();
    assert_eq!(rig.state(), S::Exposing);
    assert!(!rig.entered().contains(&S::Calibrating));
}

#[test]
fn test_press_states_run_when_press_configured() {
    let mut rig = Rig::booted(1, |s| s.first_layer.press_microns = 500);
    rig.command(Command::Start);
    rig.motor_done();
    rig.button(BUTTON2);
    assert_eq!(rig.state(), S::Pressing);
    rig.motor_done();
    // No press wait, so the delay ends at once
    assert_eq!(rig.state(), S::Unpressing);
    rig.motor_done();
    assert_eq!(rig.state(), S::Exposing);
}

#[test]
fn test_estimate_tracks_layers() {
    let mut rig = Rig::booted(3, |_| {});
    let settings = rig.engine.settings().get();
    rig.start_to_exposure();
    let first = rig.engine.status().estimated_seconds_remaining;
    assert_eq!(first, estimate_remaining_seconds(&settings, 1, 3).round() as u32);

    rig.separate_cleanly();
    rig.motor_done();
    let second = rig.engine.status().estimated_seconds_remaining;
    assert_eq!(second, estimate_remaining_seconds(&settings, 2, 3).round() as u32);
    assert!(second < first);
}

#[test]
fn test_overheated_start_is_rejected() {
    let mut rig = Rig::booted(2, |_| {});
    let before = rig.engine.status().clone();
    rig.thermometer.set(95.0);

    rig.command(Command::Start);

    assert_eq!(rig.state(), S::Home);
    assert!(rig.reported(ErrorCode::OverHeated));
    assert!(!rig.any_fatal());
    let after = rig.engine.status();
    assert_eq!(after.job_id, before.job_id);
    assert_eq!(after.num_layers, before.num_layers);
    assert_eq!(after.current_layer, 0);
    assert_eq!(after.error_code, None);
}

#[test]
fn test_start_without_job_is_rejected() {
    let mut rig = Rig::booted(0, |_| {});
    rig.button(BUTTON2);
    assert_eq!(rig.state(), S::Home);
    assert!(rig.reported(ErrorCode::NoValidPrintData));
}

#[test]
fn test_invalid_layer_settings_reject_start() {
    let mut rig = Rig::booted(1, |_| {});
    let path = rig.dir.path().join("current").join("layersettings.json");
    std::fs::write(path, "not json").unwrap();
    rig.command(Command::Start);
    assert_eq!(rig.state(), S::Home);
    assert!(rig.reported(ErrorCode::InvalidPerLayerSettings));
}

#[test]
fn test_overheating_mid_print_is_fatal() {
    let mut rig = Rig::booted(2, |_| {});
    rig.start_to_exposure();
    rig.thermometer.set(120.0);
    rig.event(EventKind::TemperatureTimer, EventData::None);

    assert_eq!(rig.state(), S::Error);
    let status = rig.engine.status();
    assert!(status.is_error);
    assert_eq!(status.error_code, Some(ErrorCode::OverHeated));
    assert_eq!(status.current_layer, 0);

    // Either button leaves the error state and re-initializes
    rig.thermometer.set(25.0);
    rig.button(BUTTON1);
    assert_eq!(rig.state(), S::Homing);
    assert!(!rig.engine.status().is_error);
}

#[test]
fn test_motor_error_status_is_fatal() {
    let mut rig = Rig::booted(1, |_| {});
    rig.command(Command::Start);
    rig.event(EventKind::MotorInterrupt, EventData::Byte(0xFF));
    assert_eq!(rig.state(), S::Error);
    let status = rig.engine.status();
    assert_eq!(status.error_code, Some(ErrorCode::MotorError));
    assert_eq!(status.errno, 0xFF);
}

#[test]
fn test_motor_timeout_is_fatal() {
    let mut rig = Rig::booted(1, |_| {});
    rig.command(Command::Start);
    assert!(rig.timers.motor_timeout.is_armed());
    rig.event(EventKind::MotorTimeout, EventData::None);
    assert_eq!(rig.state(), S::Error);
    assert_eq!(rig.engine.status().error_code, Some(ErrorCode::MotorTimeout));
}

#[test]
fn test_jam_recovered_on_second_attempt() {
    let mut rig = Rig::booted(1, |_| {});
    rig.start_to_exposure();
    rig.exposure_end();
    rig.motor_done();
    assert_eq!(rig.state(), S::Unjamming);
    assert_eq!(rig.engine.status().ui_sub_state, UiSubState::RotationJammed);

    rig.rotation();
    rig.motor_done();
    assert_eq!(rig.state(), S::Approaching);
    rig.motor_done();
    assert_eq!(rig.state(), S::Homing);
}

#[test]
fn test_jammed_waits_for_user() {
    let mut rig = Rig::booted(1, |_| {});
    rig.start_to_exposure();
    rig.exposure_end();
    rig.motor_done();
    rig.motor_done();
    rig.motor_done();
    assert_eq!(rig.state(), S::Jammed);

    rig.command(Command::Resume);
    assert_eq!(rig.state(), S::Approaching);
    rig.motor_done();
    assert_eq!(rig.state(), S::Homing);
}

#[test]
fn test_pause_inspect_and_resume() {
    let mut rig = Rig::booted(2, |_| {});
    rig.start_to_exposure();
    rig.command(Command::Pause);
    assert_eq!(rig.state(), S::Exposing);
    assert_eq!(rig.engine.status().ui_sub_state, UiSubState::AboutToPause);

    rig.separate_cleanly();
    rig.motor_done();
    assert_eq!(rig.state(), S::MovingToPause);
    rig.motor_done();
    assert_eq!(rig.state(), S::Paused);

    // Declining a cancel from Paused returns to Paused
    rig.command(Command::Cancel);
    assert_eq!(rig.state(), S::ConfirmCancel);
    rig.command(Command::Resume);
    assert_eq!(rig.state(), S::Paused);

    rig.command(Command::Resume);
    assert_eq!(rig.state(), S::MovingToResume);
    rig.motor_done();
    assert_eq!(rig.state(), S::Exposing);
    assert_eq!(rig.engine.status().current_layer, 2);
}

#[test]
fn test_declined_cancel_mid_press_resumes_motion() {
    let mut rig = Rig::booted(1, |s| s.first_layer.press_microns = 500);
    rig.command(Command::Start);
    rig.motor_done();
    rig.button(BUTTON2);
    assert_eq!(rig.state(), S::Pressing);
    assert!(rig.timers.motor_timeout.is_armed());

    rig.button(BUTTON1);
    assert_eq!(rig.state(), S::ConfirmCancel);
    assert!(!rig.timers.motor_timeout.is_armed());

    rig.button(BUTTON2);
    assert_eq!(rig.state(), S::Pressing);
    assert!(rig.timers.motor_timeout.is_armed());
    rig.motor_done();
    assert_eq!(rig.state(), S::Unpressing);
}

#[test]
fn test_declined_cancel_mid_exposure_resumes_exposure() {
    let mut rig = Rig::booted(1, |_| {});
    rig.start_to_exposure();
    rig.command(Command::Cancel);
    assert_eq!(rig.state(), S::ConfirmCancel);
    assert!(!rig.timers.exposure.is_armed());
    assert_eq!(rig.projector.last_frame(), Some(ProjectedFrame::Black));

    rig.command(Command::Resume);
    assert_eq!(rig.state(), S::Exposing);
    assert!(rig.timers.exposure.is_armed());
    assert!(matches!(rig.projector.last_frame(), Some(ProjectedFrame::Image { .. })));
}

#[test]
fn test_confirmed_cancel_returns_home() {
    let mut rig = Rig::booted(2, |_| {});
    rig.start_to_exposure();
    rig.command(Command::Cancel);
    rig.command(Command::Cancel);
    assert_eq!(rig.state(), S::AwaitingCancelation);
    rig.motor_done();
    assert_eq!(rig.state(), S::Homing);
    rig.motor_done();
    assert_eq!(rig.state(), S::Home);
    let status = rig.engine.status();
    assert_eq!(status.ui_sub_state, UiSubState::PrintCanceled);
    assert_eq!(status.current_layer, 0);
    assert_eq!(status.num_layers, 2);
}

#[test]
fn test_door_open_mid_print_cancels_print() {
    let mut rig = Rig::booted(2, |_| {});
    rig.start_to_exposure();
    rig.event(EventKind::DoorInterrupt, EventData::Byte(b'1'));
    assert_eq!(rig.state(), S::DoorOpen);
    assert!(!rig.timers.exposure.is_armed());

    rig.event(EventKind::DoorInterrupt, EventData::Byte(b'0'));
    assert_eq!(rig.state(), S::Homing);
    rig.motor_done();
    assert_eq!(rig.state(), S::Home);
    assert_eq!(rig.engine.status().ui_sub_state, UiSubState::PrintCanceled);
}

#[test]
fn test_door_open_at_boot_delays_initialization() {
    let mut rig = Rig::new(1, |_| {});
    rig.engine.start(BootConditions {
        demo_mode: false,
        door_open: true,
    });
    assert_eq!(rig.state(), S::DoorOpen);
    rig.event(EventKind::DoorInterrupt, EventData::Byte(b'0'));
    assert_eq!(rig.state(), S::Homing);
}

#[test]
fn test_commands_outside_home_are_rejected() {
    let mut rig = Rig::booted(1, |_| {});
    let staged = rig.dir.path().join("staging");
    std::fs::create_dir_all(&staged).unwrap();
    std::fs::write(staged.join("settings.json"), r#"{"MaxTemperatureC": 70.0}"#).unwrap();

    rig.start_to_exposure();
    rig.command(Command::ApplySettings);
    assert_eq!(rig.state(), S::Exposing);
    assert_eq!(rig.engine.settings().read().max_temperature_c, 80.0);

    rig.engine.handle_command_text("frobnicate");
    assert_eq!(rig.state(), S::Exposing);
}

#[test]
fn test_apply_staged_settings_in_home() {
    let mut rig = Rig::booted(1, |_| {});
    let staged = rig.dir.path().join("staging");
    std::fs::create_dir_all(&staged).unwrap();
    std::fs::write(staged.join("settings.json"), r#"{"MaxTemperatureC": 70.0}"#).unwrap();

    rig.engine.handle_command_text("applysettings");
    assert_eq!(rig.engine.settings().read().max_temperature_c, 70.0);
}

#[test]
fn test_process_staged_print_data() {
    let mut rig = Rig::booted(1, |_| {});
    let staged = rig.dir.path().join("staging");
    write_job(&staged, 4);
    std::fs::write(staged.join("printsettings.json"), r#"{"JobName": "bracket"}"#).unwrap();
    let old_id = rig.engine.status().job_id.clone();

    rig.command(Command::ProcessPrintData);

    let status = rig.engine.status();
    assert_eq!(status.ui_sub_state, UiSubState::LoadedPrintData);
    assert_eq!(status.num_layers, 4);
    assert_eq!(status.job_name, "bracket");
    assert_ne!(status.job_id, old_id);
    assert_eq!(rig.engine.settings().read().job_name, "bracket");
}

#[test]
fn test_failed_print_data_keeps_old_job() {
    let mut rig = Rig::booted(2, |_| {});
    let staged = rig.dir.path().join("staging");
    write_job(&staged, 3);
    std::fs::remove_file(staged.join("slice_2.png")).unwrap();

    rig.command(Command::ProcessPrintData);

    let status = rig.engine.status();
    assert_eq!(status.ui_sub_state, UiSubState::PrintDataLoadFailed);
    assert_eq!(status.num_layers, 2);
    assert!(rig.reported(ErrorCode::PrintDataLoad));
    assert_eq!(rig.state(), S::Home);
}

#[test]
fn test_usb_drive_job_loaded_with_right_button() {
    let mut rig = Rig::booted(0, |_| {});
    let mount = rig.dir.path().join("usb");
    write_job(&mount.join("resinkit"), 2);

    rig.event(
        EventKind::UsbDriveConnected,
        EventData::Text(mount.display().to_string()),
    );
    assert_eq!(rig.engine.status().ui_sub_state, UiSubState::UsbFileFound);

    rig.button(BUTTON2);
    assert_eq!(rig.state(), S::Home);
    assert_eq!(rig.engine.status().ui_sub_state, UiSubState::LoadedPrintData);
    assert_eq!(rig.engine.status().num_layers, 2);
}

#[test]
fn test_usb_drive_removed_restores_home_screen() {
    let mut rig = Rig::booted(1, |_| {});
    let mount = rig.dir.path().join("empty-usb");
    std::fs::create_dir_all(&mount).unwrap();
    rig.event(
        EventKind::UsbDriveConnected,
        EventData::Text(mount.display().to_string()),
    );
    assert_eq!(rig.engine.status().ui_sub_state, UiSubState::UsbDriveError);
    rig.event(EventKind::UsbDriveDisconnected, EventData::None);
    assert_eq!(rig.engine.status().ui_sub_state, UiSubState::HavePrintData);
}

#[test]
fn test_panel_error_and_unknown_buttons() {
    let mut rig = Rig::booted(1, |_| {});
    rig.button(0x40);
    assert_eq!(rig.state(), S::Home);
    rig.button(0xFF);
    assert_eq!(rig.state(), S::Error);
    assert_eq!(rig.engine.status().error_code, Some(ErrorCode::FrontPanelError));
}

#[test]
fn test_get_status_publishes_snapshot() {
    let mut rig = Rig::booted(1, |_| {});
    let before = rig.statuses.lock().len();
    rig.command(Command::GetStatus);
    let statuses = rig.statuses.lock();
    assert_eq!(statuses.len(), before + 1);
    let last = statuses.last().unwrap();
    assert_eq!(last.state, S::Home);
    assert_eq!(last.change, StateChange::NoChange);
}

#[test]
fn test_reset_in_error_waits_for_closed_door() {
    let mut rig = Rig::booted(1, |_| {});
    rig.start_to_exposure();
    rig.button(0xFF);
    assert_eq!(rig.state(), S::Error);
    rig.door(true);
    assert_eq!(rig.state(), S::Error);

    let homes_before = rig.entered().iter().filter(|s| **s == S::Homing).count();
    rig.button(BUTTON1);
    assert_eq!(rig.state(), S::DoorOpen);
    rig.command(Command::Reset);
    assert_eq!(rig.state(), S::DoorOpen);
    let homes_after = rig.entered().iter().filter(|s| **s == S::Homing).count();
    assert_eq!(homes_before, homes_after);

    rig.door(false);
    assert_eq!(rig.state(), S::Homing);
    assert!(!rig.engine.status().is_error);
    rig.motor_done();
    assert_eq!(rig.state(), S::Home);
}

#[test]
fn test_door_cycled_in_error_allows_reset() {
    let mut rig = Rig::booted(1, |_| {});
    rig.button(0xFF);
    rig.door(true);
    rig.door(false);
    assert_eq!(rig.state(), S::Error);
    rig.button(BUTTON2);
    assert_eq!(rig.state(), S::Homing);
}

fn input() -> impl Strategy<Value = (EventKind, EventData)> {
    prop_oneof![
        Just((EventKind::MotorInterrupt, EventData::Byte(0))),
        Just((EventKind::RotationInterrupt, EventData::None)),
        Just((EventKind::DelayEnd, EventData::None)),
        Just((EventKind::ExposureEnd, EventData::None)),
        Just((EventKind::TemperatureTimer, EventData::None)),
        Just((EventKind::DoorInterrupt, EventData::Byte(b'1'))),
        Just((EventKind::DoorInterrupt, EventData::Byte(b'0'))),
        prop::sample::select(vec![0x01u8, 0x02, 0x04, 0x08, 0x10, 0x20])
            .prop_map(|code| (EventKind::ButtonInterrupt, EventData::Byte(code))),
        prop::sample::select(vec![
            "start", "cancel", "pause", "resume", "reset", "test", "calimage", "getstatus",
            "startregistering", "registrationsucceeded",
        ])
        .prop_map(|text| (EventKind::HostCommand, EventData::Text(text.to_string()))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_healthy_hardware_never_faults(inputs in prop::collection::vec(input(), 1..60)) {
        let mut rig = Rig::booted(2, |_| {});
        for (kind, data) in inputs {
            rig.event(kind, data);
            let status = rig.engine.status();
            prop_assert!(status.current_layer <= status.num_layers);
            prop_assert_ne!(rig.state(), S::Error);
        }
        prop_assert!(!rig.any_fatal());
    }

    #[test]
    fn prop_cancel_or_finish_returns_home(inputs in prop::collection::vec(input(), 1..60)) {
        let mut rig = Rig::booted(2, |_| {});
        for (kind, data) in inputs {
            rig.event(kind, data);
        }
        for _ in 0..20 {
            if rig.state() == S::Home {
                break;
            }
            rig.drain_step();
        }
        prop_assert_eq!(rig.state(), S::Home);
        prop_assert!(!rig.any_fatal());
    }

    #[test]
    fn prop_rotation_on_any_attempt_recovers(
        (tries, recovered_on) in (1u32..5).prop_flat_map(|n| (Just(n), 1..=n))
    ) {
        let mut rig = Rig::booted(1, |s| s.max_unjam_tries = tries);
        rig.start_to_exposure();
        rig.exposure_end();
        rig.motor_done();
        prop_assert_eq!(rig.state(), S::Unjamming);
        for _ in 1..recovered_on {
            rig.motor_done();
            prop_assert_eq!(rig.state(), S::Unjamming);
        }
        rig.rotation();
        rig.motor_done();
        prop_assert_eq!(rig.state(), S::Approaching);
        let entered = rig.entered();
        let attempts = entered.iter().filter(|s| **s == S::Unjamming).count() as u32;
        prop_assert_eq!(attempts, recovered_on);
        prop_assert!(!entered.contains(&S::Jammed));
    }

    #[test]
    fn prop_unjam_attempts_bounded_by_setting(tries in 1u32..5) {
        let mut rig = Rig::booted(1, |s| s.max_unjam_tries = tries);
        rig.start_to_exposure();
        rig.exposure_end();
        for _ in 0..=tries {
            rig.motor_done();
        }
        prop_assert_eq!(rig.state(), S::Jammed);
        let attempts = rig.entered().iter().filter(|s| **s == S::Unjamming).count() as u32;
        prop_assert_eq!(attempts, tries);
    }
}
