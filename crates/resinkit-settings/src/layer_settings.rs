//! Settings for the layer being printed, and motion kinematics
//!
//! `CurrentLayerSettings` is rebuilt once per layer from the printer-wide
//! settings and the optional per-layer override table. Press, wait and
//! exposure values come from the layer's own overrides. Separation and
//! approach happen after the exposure and prepare the next layer, so they
//! take the overrides of the next layer.

use crate::config::{LayerTypeSettings, Settings};
use crate::per_layer::PerLayerSettings;
use resinkit_core::LayerType;

/// Seconds to rotate the tray `millidegrees` at `rpm`
pub fn rotation_seconds(millidegrees: i32, rpm: i32) -> f64 {
    if rpm <= 0 {
        return 0.0;
    }
    // rpm * 360 degrees per minute is 6 * rpm degrees per second
    (f64::from(millidegrees.unsigned_abs()) / 1000.0) / (6.0 * f64::from(rpm))
}

/// Seconds to travel `microns` at `microns_per_sec`
pub fn z_seconds(microns: i32, microns_per_sec: i32) -> f64 {
    if microns_per_sec <= 0 {
        return 0.0;
    }
    f64::from(microns.unsigned_abs()) / f64::from(microns_per_sec)
}

impl LayerTypeSettings {
    /// Time for the press and unpress, including the hold
    pub fn press_seconds(&self) -> f64 {
        if self.press_microns == 0 {
            return 0.0;
        }
        z_seconds(self.press_microns, self.press_speed)
            + self.press_wait_sec
            + z_seconds(self.press_microns, self.unpress_speed)
    }

    pub fn separation_seconds(&self) -> f64 {
        rotation_seconds(self.rotation_millidegrees, self.separation_rpm)
            + z_seconds(self.z_lift_microns, self.separation_z_speed)
    }

    pub fn approach_seconds(&self) -> f64 {
        rotation_seconds(self.rotation_millidegrees, self.approach_rpm)
            + z_seconds(self.z_lift_microns, self.approach_z_speed)
    }

    /// Whole-layer duration: press sequence, settling, exposure, separation
    /// and approach
    pub fn layer_seconds(&self) -> f64 {
        self.press_seconds()
            + self.approach_wait_sec
            + self.exposure_sec
            + self.separation_seconds()
            + self.approach_seconds()
    }
}

/// Motion parameters for an axis pair during a non-layer move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveProfile {
    pub rot_jerk: i32,
    pub rpm: i32,
    pub z_jerk: i32,
    pub z_speed: i32,
}

/// Parameters in force for the current layer
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentLayerSettings {
    pub layer: u32,
    pub layer_type: LayerType,
    pub layer_thickness_microns: i32,
    pub inspection_height_microns: i32,
    pub max_z_travel_microns: i32,
    pub home_rotation_millidegrees: i32,
    pub home: MoveProfile,
    pub start: MoveProfile,
    pub params: LayerTypeSettings,
}

impl CurrentLayerSettings {
    /// Build the settings for `layer` (1-based; 0 means no print underway)
    pub fn for_layer(settings: &Settings, layer: u32, per_layer: &PerLayerSettings) -> Self {
        let layer_type = LayerType::for_layer(layer, settings.burn_in_layers);
        let mut params = settings.layer(layer_type).clone();
        if let Some(overrides) = per_layer.get(layer) {
            overrides.apply_exposure(&mut params);
        }
        if let Some(overrides) = per_layer.get(layer + 1) {
            overrides.apply_motion(&mut params);
        }
        Self {
            layer,
            layer_type,
            layer_thickness_microns: settings.layer_thickness_microns,
            inspection_height_microns: settings.inspection_height_microns,
            max_z_travel_microns: settings.max_z_travel_microns,
            home_rotation_millidegrees: settings.home_rotation_millidegrees,
            home: MoveProfile {
                rot_jerk: settings.home_rot_jerk,
                rpm: settings.home_rpm,
                z_jerk: settings.home_z_jerk,
                z_speed: settings.home_z_speed,
            },
            start: MoveProfile {
                rot_jerk: settings.start_rot_jerk,
                rpm: settings.start_rpm,
                z_jerk: settings.start_z_jerk,
                z_speed: settings.start_z_speed,
            },
            params,
        }
    }

    /// Settings used outside of a print, e.g. while homing
    pub fn idle(settings: &Settings) -> Self {
        Self::for_layer(settings, 0, &PerLayerSettings::default())
    }

    pub fn home_seconds(&self) -> f64 {
        rotation_seconds(self.home_rotation_millidegrees, self.home.rpm)
            + z_seconds(self.max_z_travel_microns, self.home.z_speed)
    }

    pub fn start_seconds(&self) -> f64 {
        rotation_seconds(self.home_rotation_millidegrees, self.start.rpm)
            + z_seconds(self.max_z_travel_microns, self.start.z_speed)
    }

    pub fn inspect_seconds(&self) -> f64 {
        rotation_seconds(self.params.rotation_millidegrees, self.params.approach_rpm)
            + z_seconds(self.inspection_height_microns, self.params.approach_z_speed)
    }

    pub fn unjam_seconds(&self) -> f64 {
        rotation_seconds(self.params.rotation_millidegrees, self.params.separation_rpm)
    }
}

/// Seconds left in a print, counting the current layer
///
/// Uses the printer-wide parameters of each layer class; per-layer overrides
/// are not looked ahead.
pub fn estimate_remaining_seconds(settings: &Settings, current_layer: u32, num_layers: u32) -> f64 {
    if num_layers == 0 || current_layer > num_layers {
        return 0.0;
    }
    let first = current_layer.max(1);
    let burn_in_end = (settings.burn_in_layers + 1).min(num_layers);

    let mut seconds = 0.0;
    if first == 1 {
        seconds += settings.first_layer.layer_seconds();
    }
    let burn_in_from = first.max(2);
    if burn_in_end >= burn_in_from {
        seconds += f64::from(burn_in_end - burn_in_from + 1) * settings.burn_in_layer.layer_seconds();
    }
    let model_from = first.max(burn_in_end + 1).max(2);
    if num_layers >= model_from {
        seconds += f64::from(num_layers - model_from + 1) * settings.model_layer.layer_seconds();
    }
    seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::per_layer::LayerOverrides;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_rotation_kinematics() {
        // 60 degrees at 10 rpm = 60 / 60 deg/s
        assert!(close(rotation_seconds(60_000, 10), 1.0));
        assert!(close(rotation_seconds(-60_000, 10), 1.0));
        assert_eq!(rotation_seconds(60_000, 0), 0.0);
    }

    #[test]
    fn test_z_kinematics() {
        assert!(close(z_seconds(2000, 5000), 0.4));
        assert_eq!(z_seconds(2000, 0), 0.0);
    }

    #[test]
    fn test_press_skipped_when_disabled() {
        let mut params = LayerTypeSettings::default();
        params.press_wait_sec = 3.0;
        assert_eq!(params.press_seconds(), 0.0);
        params.press_microns = 1000;
        assert!(close(params.press_seconds(), 1.0 + 3.0 + 1.0));
    }

    #[test]
    fn test_remaining_time_first_layer() {
        let mut settings = Settings::default();
        settings.burn_in_layers = 2;
        let expected = settings.first_layer.layer_seconds()
            + 2.0 * settings.burn_in_layer.layer_seconds()
            + 7.0 * settings.model_layer.layer_seconds();
        assert!(close(estimate_remaining_seconds(&settings, 1, 10), expected));
    }

    #[test]
    fn test_remaining_time_later_layers() {
        let mut settings = Settings::default();
        settings.burn_in_layers = 2;
        let burn_in = settings.burn_in_layer.layer_seconds();
        let model = settings.model_layer.layer_seconds();
        assert!(close(estimate_remaining_seconds(&settings, 3, 10), burn_in + 7.0 * model));
        assert!(close(estimate_remaining_seconds(&settings, 10, 10), model));
        assert_eq!(estimate_remaining_seconds(&settings, 11, 10), 0.0);
    }

    #[test]
    fn test_remaining_time_short_print() {
        let mut settings = Settings::default();
        settings.burn_in_layers = 5;
        let expected =
            settings.first_layer.layer_seconds() + 2.0 * settings.burn_in_layer.layer_seconds();
        assert!(close(estimate_remaining_seconds(&settings, 1, 3), expected));
    }

    #[test]
    fn test_overrides_split_between_layers() {
        let settings = Settings::default();
        let mut table = PerLayerSettings::default();
        table.insert(
            3,
            LayerOverrides {
                exposure_sec: Some(9.0),
                separation_rpm: Some(2),
                ..Default::default()
            },
        );

        let layer2 = CurrentLayerSettings::for_layer(&settings, 2, &table);
        assert_eq!(layer2.params.separation_rpm, 2);
        assert_eq!(layer2.params.exposure_sec, settings.model_layer.exposure_sec);

        let layer3 = CurrentLayerSettings::for_layer(&settings, 3, &table);
        assert_eq!(layer3.params.exposure_sec, 9.0);
        assert_eq!(layer3.params.separation_rpm, settings.model_layer.separation_rpm);
    }

    #[test]
    fn test_layer_class_selection() {
        let settings = Settings::default();
        let table = PerLayerSettings::default();
        assert_eq!(CurrentLayerSettings::for_layer(&settings, 1, &table).layer_type, LayerType::First);
        assert_eq!(CurrentLayerSettings::for_layer(&settings, 2, &table).layer_type, LayerType::BurnIn);
        assert_eq!(CurrentLayerSettings::for_layer(&settings, 3, &table).layer_type, LayerType::Model);
    }
}
