//! Process wiring
//!
//! Builds the reactor, opens the settings, connects the hardware sources to
//! interrupt lines and hands everything to the print engine.

use crate::cli::Args;
use crate::simulation::{MotionLines, SimulatedDoor, SimulatedMotorController};
use anyhow::Context;
use resinkit_communication::motor::STATUS_REGISTER;
use resinkit_communication::{
    FrontPanel, I2cDevice, Motor, NoOpI2cDevice, OneWireThermometer, Projector,
    SimulatedProjector, SimulatedThermometer, Thermometer, FRONT_PANEL_ADDRESS, MOTOR_ADDRESS,
};
use resinkit_core::{shared, EventData, EventKind, StatusBus, StatusFilter};
use resinkit_engine::{
    spawn_line_reader, BootConditions, EngineTimers, PrintEngine, PrinterHardware, Reactor,
    SignalResource,
};
use resinkit_settings::SettingsStore;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

/// Run the printer until an `Exit` command or a termination signal
pub fn run(args: &Args) -> anyhow::Result<()> {
    tracing::info!("ResinKit {} (built {})", crate::VERSION, crate::BUILD_DATE);

    let settings = SettingsStore::open(&args.settings)
        .with_context(|| format!("loading settings from {}", args.settings.display()))?;
    if let Some(dir) = &args.print_data_dir {
        settings
            .update(|s| s.print_data_dir = dir.clone())
            .context("overriding the print data directory")?;
    }

    let mut reactor = Reactor::new().context("creating the event reactor")?;
    let timers = EngineTimers::register(&mut reactor)?;

    // Motor controller
    let (motor_device, mut status_reader, controller): (
        Box<dyn I2cDevice>,
        Box<dyn I2cDevice>,
        Option<SimulatedMotorController>,
    ) = if args.simulate {
        let motion_time = Duration::try_from_secs_f64(args.motion_seconds)
            .with_context(|| format!("invalid motion time {}", args.motion_seconds))?;
        let controller = SimulatedMotorController::new(reactor.runtime(), motion_time);
        tracing::info!("Simulating the motor controller ({:?} per motion)", motion_time);
        (
            Box::new(controller.clone()),
            Box::new(controller.clone()),
            Some(controller),
        )
    } else {
        tracing::warn!("No motor controller attached; motions will time out");
        (
            Box::new(NoOpI2cDevice::new(MOTOR_ADDRESS)),
            Box::new(NoOpI2cDevice::new(MOTOR_ADDRESS)),
            None,
        )
    };

    let motor_line = reactor.add_interrupt(EventKind::MotorInterrupt, move || {
        status_reader
            .read_register(STATUS_REGISTER)
            .map(|status| Some(EventData::Byte(status)))
    })?;
    let rotation_line =
        reactor.add_interrupt(EventKind::RotationInterrupt, || Ok(Some(EventData::None)))?;
    if let Some(controller) = &controller {
        controller.connect(MotionLines {
            motor: motor_line,
            rotation: rotation_line,
        });
    }

    // Front panel
    let mut panel = FrontPanel::new(Box::new(NoOpI2cDevice::new(FRONT_PANEL_ADDRESS)));
    let demo_mode = args.demo
        || panel.demo_override().unwrap_or_else(|e| {
            tracing::warn!("Could not read the demo override: {}", e);
            false
        });
    reactor.add_interrupt(EventKind::ButtonInterrupt, move || {
        panel.read_button().map(|code| Some(EventData::Byte(code)))
    })?;

    // Door switch
    let open_level = if settings.read().door_is_open(1) { 1 } else { 0 };
    let level = if args.door_open { open_level } else { 1 - open_level };
    let door = SimulatedDoor::new(level);
    let door_open = settings.read().door_is_open(door.level());
    reactor.add_interrupt(EventKind::DoorInterrupt, move || {
        Ok(Some(EventData::Byte(door.level())))
    })?;

    // Host commands
    let commands = reactor.add_queue(EventKind::HostCommand)?;
    match &args.command_pipe {
        Some(path) => {
            let pipe = File::open(path)
                .with_context(|| format!("opening command pipe {}", path.display()))?;
            spawn_line_reader(BufReader::new(pipe), commands)?;
            tracing::info!("Reading host commands from {}", path.display());
        }
        None => {
            spawn_line_reader(BufReader::new(std::io::stdin()), commands)?;
            tracing::info!("Reading host commands from stdin");
        }
    }

    reactor.register(EventKind::Signal, SignalResource::new())?;

    let bus = Arc::new(StatusBus::new());
    bus.subscribe(StatusFilter::EnteringOnly, |status| {
        tracing::info!(
            state = status.state.name(),
            layer = status.current_layer,
            layers = status.num_layers,
            "Entering {}",
            status.state.name()
        );
    });

    let thermometer: Box<dyn Thermometer> = match &args.thermometer {
        Some(path) => Box::new(OneWireThermometer::new(path)),
        None => Box::new(SimulatedThermometer::new(25.0)),
    };
    let hardware = PrinterHardware {
        motor: Motor::new(motor_device),
        projector: Projector::new(Box::new(SimulatedProjector::new())),
        thermometer,
    };

    let engine = shared(PrintEngine::new(settings, hardware, timers, bus));
    PrintEngine::attach(&engine, &mut reactor);
    engine.borrow_mut().start(BootConditions {
        demo_mode,
        door_open,
    });

    reactor.run()?;
    tracing::info!("ResinKit stopped");
    Ok(())
}
