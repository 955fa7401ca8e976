//! Simulated hardware
//!
//! The motor controller accepts frames like the real one and answers each
//! interrupt request by raising the motor interrupt after a fixed delay. The
//! rotation sensor pulses just before, so jam detection sees a turning tray.
//! Pause holds the outstanding completion until Resume; Reset and
//! ClearPending drop it.

use parking_lot::Mutex;
use resinkit_communication::motor::protocol::register;
use resinkit_communication::motor::{
    GeneralAction, MotorCommand, MOTOR_ADDRESS, STATUS_REGISTER, STATUS_SUCCESS,
};
use resinkit_communication::I2cDevice;
use resinkit_core::HardwareError;
use resinkit_engine::InterruptLine;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Interrupt lines raised when a simulated motion finishes
#[derive(Clone)]
pub struct MotionLines {
    pub motor: InterruptLine,
    pub rotation: InterruptLine,
}

#[derive(Default)]
struct ControllerState {
    generation: u64,
    outstanding: bool,
    paused: bool,
    lines: Option<MotionLines>,
}

/// Motor controller that completes motions on a timer
///
/// Clones share one controller, so one clone can be handed to the motor
/// driver and another to the interrupt reader.
#[derive(Clone)]
pub struct SimulatedMotorController {
    state: Arc<Mutex<ControllerState>>,
    runtime: Handle,
    motion_time: Duration,
}

impl SimulatedMotorController {
    pub fn new(runtime: Handle, motion_time: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControllerState::default())),
            runtime,
            motion_time,
        }
    }

    /// Lines to raise when a motion completes
    pub fn connect(&self, lines: MotionLines) {
        self.state.lock().lines = Some(lines);
    }

    fn schedule(&self, state: &mut ControllerState) {
        let Some(lines) = state.lines.clone() else {
            tracing::warn!("Simulated motion finished with no interrupt lines connected");
            return;
        };
        let generation = state.generation;
        let shared = self.state.clone();
        let delay = self.motion_time;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = shared.lock();
                if state.generation != generation || !state.outstanding {
                    return;
                }
                state.outstanding = false;
            }
            lines.rotation.trigger();
            lines.motor.trigger();
        });
    }
}

fn general_action(command: &MotorCommand) -> Option<GeneralAction> {
    if command.register != register::GENERAL {
        return None;
    }
    [
        GeneralAction::Reset,
        GeneralAction::RequestInterrupt,
        GeneralAction::Pause,
        GeneralAction::Resume,
        GeneralAction::ClearPending,
        GeneralAction::EnableMotors,
        GeneralAction::DisableMotors,
    ]
    .into_iter()
    .find(|action| *action as u8 == command.action)
}

impl I2cDevice for SimulatedMotorController {
    fn address(&self) -> u8 {
        MOTOR_ADDRESS
    }

    fn write(&mut self, data: &[u8]) -> Result<(), HardwareError> {
        let command = MotorCommand::decode(data).ok_or_else(|| HardwareError::I2cWrite {
            address: MOTOR_ADDRESS,
            reason: format!("malformed frame {:02X?}", data),
        })?;
        tracing::trace!("Simulated motor controller: {}", command);

        let mut state = self.state.lock();
        match general_action(&command) {
            Some(GeneralAction::RequestInterrupt) => {
                state.generation = state.generation.wrapping_add(1);
                state.outstanding = true;
                if !state.paused {
                    self.schedule(&mut state);
                }
            }
            Some(GeneralAction::Pause) => {
                state.generation = state.generation.wrapping_add(1);
                state.paused = true;
            }
            Some(GeneralAction::Resume) => {
                state.generation = state.generation.wrapping_add(1);
                state.paused = false;
                if state.outstanding {
                    self.schedule(&mut state);
                }
            }
            Some(GeneralAction::Reset | GeneralAction::ClearPending) => {
                state.generation = state.generation.wrapping_add(1);
                state.outstanding = false;
                state.paused = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn read_register(&mut self, register: u8) -> Result<u8, HardwareError> {
        Ok(if register == STATUS_REGISTER {
            STATUS_SUCCESS
        } else {
            0
        })
    }
}

/// Door switch with a settable GPIO level
#[derive(Debug, Clone, Default)]
pub struct SimulatedDoor {
    level: Arc<AtomicU8>,
}

impl SimulatedDoor {
    pub fn new(level: u8) -> Self {
        Self {
            level: Arc::new(AtomicU8::new(level)),
        }
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::SeqCst)
    }

    pub fn set_level(&self, level: u8) {
        self.level.store(level, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resinkit_communication::{HighLevelMotorCommand, Motor};
    use resinkit_core::{EventData, EventKind};
    use resinkit_engine::Reactor;
    use resinkit_settings::{CurrentLayerSettings, Settings};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Bench {
        reactor: Reactor,
        controller: SimulatedMotorController,
        completions: Rc<RefCell<Vec<u8>>>,
        rotations: Rc<RefCell<u32>>,
    }

    fn bench() -> Bench {
        let mut reactor = Reactor::new().unwrap();
        let controller = SimulatedMotorController::new(reactor.runtime(), Duration::from_millis(20));
        let mut status_reader = controller.clone();
        let motor = reactor
            .add_interrupt(EventKind::MotorInterrupt, move || {
                status_reader
                    .read_register(STATUS_REGISTER)
                    .map(|status| Some(EventData::Byte(status)))
            })
            .unwrap();
        let rotation = reactor
            .add_interrupt(EventKind::RotationInterrupt, || Ok(Some(EventData::None)))
            .unwrap();
        controller.connect(MotionLines { motor, rotation });

        let completions = Rc::new(RefCell::new(Vec::new()));
        let sink = completions.clone();
        reactor.subscribe(EventKind::MotorInterrupt, move |data| {
            if let Some(status) = data.as_byte() {
                sink.borrow_mut().push(status);
            }
        });
        let rotations = Rc::new(RefCell::new(0));
        let counter = rotations.clone();
        reactor.subscribe(EventKind::RotationInterrupt, move |_| *counter.borrow_mut() += 1);

        Bench {
            reactor,
            controller,
            completions,
            rotations,
        }
    }

    impl Bench {
        /// Run the reactor until a completion arrives or `limit` wakeups time out
        fn wait_for_completion(&mut self, limit: usize) {
            for _ in 0..limit {
                if !self.completions.borrow().is_empty() {
                    return;
                }
                self.reactor.run_once(Some(Duration::from_millis(200))).unwrap();
            }
        }

        fn send(&self, command: HighLevelMotorCommand) {
            let mut motor = Motor::new(Box::new(self.controller.clone()));
            let layer = CurrentLayerSettings::idle(&Settings::default());
            motor.send(command, &layer).unwrap();
        }
    }

    #[test]
    fn test_motion_completes_with_rotation() {
        let mut bench = bench();
        bench.send(HighLevelMotorCommand::Separate);
        bench.wait_for_completion(10);
        assert_eq!(*bench.completions.borrow(), vec![STATUS_SUCCESS]);
        assert_eq!(*bench.rotations.borrow(), 1);
    }

    #[test]
    fn test_commands_without_completion_stay_silent() {
        let mut bench = bench();
        bench.send(HighLevelMotorCommand::Initialize);
        bench.wait_for_completion(2);
        assert!(bench.completions.borrow().is_empty());
    }

    #[test]
    fn test_pause_holds_completion_until_resume() {
        let mut bench = bench();
        bench.send(HighLevelMotorCommand::GoHome);
        bench.send(HighLevelMotorCommand::Pause);
        bench.wait_for_completion(2);
        assert!(bench.completions.borrow().is_empty());

        bench.send(HighLevelMotorCommand::Resume);
        bench.wait_for_completion(10);
        assert_eq!(bench.completions.borrow().len(), 1);
    }

    #[test]
    fn test_clear_pending_drops_completion() {
        let mut bench = bench();
        bench.send(HighLevelMotorCommand::Approach);
        bench.send(HighLevelMotorCommand::ClearPending);
        bench.wait_for_completion(2);
        assert!(bench.completions.borrow().is_empty());
    }

    #[test]
    fn test_malformed_frame_rejected() {
        let mut controller =
            SimulatedMotorController::new(Reactor::new().unwrap().runtime(), Duration::ZERO);
        assert!(controller.write(&[0x20]).is_err());
    }

    #[test]
    fn test_door_level() {
        let door = SimulatedDoor::new(0);
        let clone = door.clone();
        clone.set_level(1);
        assert_eq!(door.level(), 1);
    }
}
