//! Motor command sequencer
//!
//! Translates a [`HighLevelMotorCommand`] and the current layer's settings
//! into controller frames and writes them. Sending never waits for the motion
//! to finish; completion arrives later as a motor interrupt, and arming the
//! timeout for it is the caller's job.

use super::protocol::{
    drive_train_settings, Axis, AxisAction, AxisSetting, GeneralAction, MotorCommand,
};
use super::HighLevelMotorCommand;
use crate::i2c::I2cDevice;
use resinkit_core::MotorError;
use resinkit_settings::CurrentLayerSettings;

/// Motor controller driver
pub struct Motor {
    device: Box<dyn I2cDevice>,
}

impl Motor {
    pub fn new(device: Box<dyn I2cDevice>) -> Self {
        Self { device }
    }

    /// Write one low-level command
    pub fn send_command(&mut self, command: &MotorCommand) -> Result<(), MotorError> {
        tracing::trace!("Motor command {}", command);
        self.device
            .write(&command.encode())
            .map_err(|source| MotorError::SendFailed {
                command: command.to_string(),
                source,
            })
    }

    /// Write a sequence, stopping at the first failure
    pub fn send_commands(&mut self, commands: &[MotorCommand]) -> Result<(), MotorError> {
        for command in commands {
            self.send_command(command)?;
        }
        Ok(())
    }

    /// Send the frames for a high-level motion
    pub fn send(
        &mut self,
        command: HighLevelMotorCommand,
        layer: &CurrentLayerSettings,
    ) -> Result<(), MotorError> {
        tracing::debug!("Sending motor command: {}", command);
        let frames = Self::commands_for(command, layer);
        self.send_commands(&frames).map_err(|e| match e {
            MotorError::SendFailed { source, .. } => MotorError::SendFailed {
                command: command.to_string(),
                source,
            },
            other => other,
        })
    }

    /// Frames that implement a high-level motion
    pub fn commands_for(
        command: HighLevelMotorCommand,
        layer: &CurrentLayerSettings,
    ) -> Vec<MotorCommand> {
        let params = &layer.params;
        let mut frames = match command {
            HighLevelMotorCommand::Initialize => {
                let mut frames = vec![MotorCommand::general(GeneralAction::Reset)];
                frames.extend(drive_train_settings(layer.max_z_travel_microns));
                frames.push(MotorCommand::general(GeneralAction::EnableMotors));
                frames
            }
            HighLevelMotorCommand::GoHome => vec![
                MotorCommand::setting(Axis::Rotation, AxisSetting::Jerk, layer.home.rot_jerk),
                MotorCommand::setting(Axis::Rotation, AxisSetting::Speed, layer.home.rpm),
                MotorCommand::motion(
                    Axis::Rotation,
                    AxisAction::Home,
                    layer.home_rotation_millidegrees,
                ),
                MotorCommand::setting(Axis::Z, AxisSetting::Jerk, layer.home.z_jerk),
                MotorCommand::setting(Axis::Z, AxisSetting::Speed, layer.home.z_speed),
                MotorCommand::motion(Axis::Z, AxisAction::Home, 0),
            ],
            HighLevelMotorCommand::MoveToStartPosition => vec![
                MotorCommand::setting(Axis::Rotation, AxisSetting::Jerk, layer.start.rot_jerk),
                MotorCommand::setting(Axis::Rotation, AxisSetting::Speed, layer.start.rpm),
                MotorCommand::motion(
                    Axis::Rotation,
                    AxisAction::Home,
                    layer.home_rotation_millidegrees,
                ),
                MotorCommand::setting(Axis::Z, AxisSetting::Jerk, layer.start.z_jerk),
                MotorCommand::setting(Axis::Z, AxisSetting::Speed, layer.start.z_speed),
                MotorCommand::motion(Axis::Z, AxisAction::Move, -layer.max_z_travel_microns),
            ],
            HighLevelMotorCommand::Separate => vec![
                MotorCommand::setting(Axis::Rotation, AxisSetting::Jerk, params.separation_rot_jerk),
                MotorCommand::setting(Axis::Rotation, AxisSetting::Speed, params.separation_rpm),
                MotorCommand::motion(
                    Axis::Rotation,
                    AxisAction::Move,
                    -params.rotation_millidegrees,
                ),
                MotorCommand::setting(Axis::Z, AxisSetting::Jerk, params.separation_z_jerk),
                MotorCommand::setting(Axis::Z, AxisSetting::Speed, params.separation_z_speed),
                MotorCommand::motion(Axis::Z, AxisAction::Move, params.z_lift_microns),
            ],
            HighLevelMotorCommand::Approach | HighLevelMotorCommand::ApproachAfterJam => {
                let rotation = if command == HighLevelMotorCommand::ApproachAfterJam {
                    MotorCommand::motion(
                        Axis::Rotation,
                        AxisAction::Home,
                        layer.home_rotation_millidegrees,
                    )
                } else {
                    MotorCommand::motion(
                        Axis::Rotation,
                        AxisAction::Move,
                        params.rotation_millidegrees,
                    )
                };
                vec![
                    MotorCommand::setting(
                        Axis::Rotation,
                        AxisSetting::Jerk,
                        params.approach_rot_jerk,
                    ),
                    MotorCommand::setting(Axis::Rotation, AxisSetting::Speed, params.approach_rpm),
                    rotation,
                    MotorCommand::setting(Axis::Z, AxisSetting::Jerk, params.approach_z_jerk),
                    MotorCommand::setting(Axis::Z, AxisSetting::Speed, params.approach_z_speed),
                    MotorCommand::motion(
                        Axis::Z,
                        AxisAction::Move,
                        layer.layer_thickness_microns - params.z_lift_microns,
                    ),
                ]
            }
            HighLevelMotorCommand::Press => vec![
                MotorCommand::setting(Axis::Z, AxisSetting::Speed, params.press_speed),
                MotorCommand::motion(Axis::Z, AxisAction::Move, -params.press_microns),
            ],
            HighLevelMotorCommand::Unpress => vec![
                MotorCommand::setting(Axis::Z, AxisSetting::Speed, params.unpress_speed),
                MotorCommand::motion(Axis::Z, AxisAction::Move, params.press_microns),
            ],
            HighLevelMotorCommand::PauseAndInspect => vec![
                MotorCommand::setting(Axis::Rotation, AxisSetting::Speed, params.approach_rpm),
                MotorCommand::motion(
                    Axis::Rotation,
                    AxisAction::Move,
                    -params.rotation_millidegrees,
                ),
                MotorCommand::setting(Axis::Z, AxisSetting::Speed, params.approach_z_speed),
                MotorCommand::motion(Axis::Z, AxisAction::Move, layer.inspection_height_microns),
            ],
            HighLevelMotorCommand::ResumeFromInspect => vec![
                MotorCommand::setting(Axis::Z, AxisSetting::Speed, params.approach_z_speed),
                MotorCommand::motion(Axis::Z, AxisAction::Move, -layer.inspection_height_microns),
                MotorCommand::setting(Axis::Rotation, AxisSetting::Speed, params.approach_rpm),
                MotorCommand::motion(
                    Axis::Rotation,
                    AxisAction::Move,
                    params.rotation_millidegrees,
                ),
            ],
            HighLevelMotorCommand::RecoverFromJam => vec![
                MotorCommand::setting(Axis::Rotation, AxisSetting::Jerk, params.separation_rot_jerk),
                MotorCommand::setting(Axis::Rotation, AxisSetting::Speed, params.separation_rpm),
                MotorCommand::motion(
                    Axis::Rotation,
                    AxisAction::Home,
                    layer.home_rotation_millidegrees,
                ),
            ],
            HighLevelMotorCommand::Pause => vec![MotorCommand::general(GeneralAction::Pause)],
            HighLevelMotorCommand::Resume => vec![MotorCommand::general(GeneralAction::Resume)],
            HighLevelMotorCommand::ClearPending | HighLevelMotorCommand::CancelMotion => {
                vec![MotorCommand::general(GeneralAction::ClearPending)]
            }
        };
        if command.awaits_completion() {
            frames.push(MotorCommand::general(GeneralAction::RequestInterrupt));
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::SimulatedI2cDevice;
    use crate::motor::protocol::register;
    use resinkit_settings::Settings;

    fn layer() -> CurrentLayerSettings {
        CurrentLayerSettings::idle(&Settings::default())
    }

    #[test]
    fn test_motions_end_with_interrupt_request() {
        let layer = layer();
        for command in [
            HighLevelMotorCommand::GoHome,
            HighLevelMotorCommand::Separate,
            HighLevelMotorCommand::Approach,
            HighLevelMotorCommand::RecoverFromJam,
            HighLevelMotorCommand::CancelMotion,
        ] {
            let frames = Motor::commands_for(command, &layer);
            assert!(frames.last().unwrap().is_interrupt_request(), "{command}");
        }
    }

    #[test]
    fn test_pause_resume_have_no_completion() {
        let layer = layer();
        assert_eq!(
            Motor::commands_for(HighLevelMotorCommand::Pause, &layer),
            vec![MotorCommand::general(GeneralAction::Pause)]
        );
        assert_eq!(
            Motor::commands_for(HighLevelMotorCommand::Resume, &layer),
            vec![MotorCommand::general(GeneralAction::Resume)]
        );
    }

    #[test]
    fn test_clear_pending_is_silent() {
        let frames = Motor::commands_for(HighLevelMotorCommand::ClearPending, &layer());
        assert_eq!(frames, vec![MotorCommand::general(GeneralAction::ClearPending)]);
    }

    #[test]
    fn test_separate_lifts_by_z_lift() {
        let layer = layer();
        let frames = Motor::commands_for(HighLevelMotorCommand::Separate, &layer);
        let lift = frames
            .iter()
            .find(|f| f.register == register::Z_ACTION)
            .unwrap();
        assert_eq!(lift.value, Some(layer.params.z_lift_microns));
    }

    #[test]
    fn test_approach_lands_one_layer_higher() {
        let layer = layer();
        let frames = Motor::commands_for(HighLevelMotorCommand::Approach, &layer);
        let lower = frames
            .iter()
            .find(|f| f.register == register::Z_ACTION)
            .unwrap();
        assert_eq!(
            lower.value,
            Some(layer.layer_thickness_microns - layer.params.z_lift_microns)
        );
    }

    #[test]
    fn test_send_writes_frames() {
        let device = SimulatedI2cDevice::new(crate::motor::MOTOR_ADDRESS);
        let mut motor = Motor::new(Box::new(device.clone()));
        motor.send(HighLevelMotorCommand::Press, &layer()).unwrap();
        assert_eq!(device.writes().len(), 3);
    }

    #[test]
    fn test_send_failure_names_command() {
        let device = SimulatedI2cDevice::new(crate::motor::MOTOR_ADDRESS);
        device.set_fail_writes(true);
        let mut motor = Motor::new(Box::new(device));
        let err = motor.send(HighLevelMotorCommand::GoHome, &layer()).unwrap_err();
        assert!(err.to_string().contains("go home"));
    }
}
