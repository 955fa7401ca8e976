//! Printer settings
//!
//! Settings are organized into:
//! - Job and storage locations
//! - Hardware capabilities (revision, jam detection)
//! - Motion safety limits (motor timeouts, temperature ceiling)
//! - Homing, start-position and inspection motion
//! - Per layer-type motion and exposure parameters (first, burn-in, model)
//!
//! Files are JSON with PascalCase keys. Missing keys take their defaults, so
//! a partial file only overrides what it names.

use crate::error::{SettingsError, SettingsResult};
use resinkit_core::constants::{DEFAULT_PRINT_DATA_DIR, DEFAULT_STAGING_DIR};
use resinkit_core::LayerType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Motion and exposure parameters for one class of layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LayerTypeSettings {
    /// Exposure time in seconds
    pub exposure_sec: f64,
    /// Press depth in microns, 0 disables the press
    pub press_microns: i32,
    /// Press speed in microns per second
    pub press_speed: i32,
    /// Hold time at full press in seconds
    pub press_wait_sec: f64,
    /// Unpress speed in microns per second
    pub unpress_speed: i32,
    /// Settling time before exposure in seconds
    pub approach_wait_sec: f64,
    /// Tray rotation jerk during separation
    pub separation_rot_jerk: i32,
    /// Tray rotation speed during separation
    #[serde(rename = "SeparationRPM")]
    pub separation_rpm: i32,
    /// Tray rotation per separation in millidegrees
    pub rotation_millidegrees: i32,
    /// Z jerk during separation
    pub separation_z_jerk: i32,
    /// Z speed during separation in microns per second
    pub separation_z_speed: i32,
    /// Z lift during separation in microns
    pub z_lift_microns: i32,
    /// Tray rotation jerk during approach
    pub approach_rot_jerk: i32,
    /// Tray rotation speed during approach
    #[serde(rename = "ApproachRPM")]
    pub approach_rpm: i32,
    /// Z jerk during approach
    pub approach_z_jerk: i32,
    /// Z speed during approach in microns per second
    pub approach_z_speed: i32,
}

impl LayerTypeSettings {
    fn first() -> Self {
        Self {
            exposure_sec: 5.0,
            separation_rpm: 6,
            approach_rpm: 6,
            z_lift_microns: 2000,
            ..Self::model()
        }
    }

    fn burn_in() -> Self {
        Self {
            exposure_sec: 4.0,
            separation_rpm: 8,
            approach_rpm: 8,
            ..Self::model()
        }
    }

    fn model() -> Self {
        Self {
            exposure_sec: 2.5,
            press_microns: 0,
            press_speed: 1000,
            press_wait_sec: 0.0,
            unpress_speed: 1000,
            approach_wait_sec: 0.0,
            separation_rot_jerk: 100_000,
            separation_rpm: 11,
            rotation_millidegrees: 60_000,
            separation_z_jerk: 100_000,
            separation_z_speed: 5000,
            z_lift_microns: 1000,
            approach_rot_jerk: 100_000,
            approach_rpm: 11,
            approach_z_jerk: 100_000,
            approach_z_speed: 5000,
        }
    }

    fn validate(&self, prefix: &str) -> SettingsResult<()> {
        if self.exposure_sec <= 0.0 {
            return Err(SettingsError::invalid(
                &format!("{prefix}.ExposureSec"),
                "must be > 0",
            ));
        }
        if self.press_wait_sec < 0.0 || self.approach_wait_sec < 0.0 {
            return Err(SettingsError::invalid(
                &format!("{prefix}.PressWaitSec"),
                "waits must not be negative",
            ));
        }
        if self.press_microns < 0 || self.z_lift_microns < 0 {
            return Err(SettingsError::invalid(
                &format!("{prefix}.ZLiftMicrons"),
                "distances must not be negative",
            ));
        }
        for (name, value) in [
            ("PressSpeed", self.press_speed),
            ("UnpressSpeed", self.unpress_speed),
            ("SeparationRPM", self.separation_rpm),
            ("SeparationZSpeed", self.separation_z_speed),
            ("ApproachRPM", self.approach_rpm),
            ("ApproachZSpeed", self.approach_z_speed),
        ] {
            if value <= 0 {
                return Err(SettingsError::invalid(
                    &format!("{prefix}.{name}"),
                    "must be > 0",
                ));
            }
        }
        Ok(())
    }
}

impl Default for LayerTypeSettings {
    fn default() -> Self {
        Self::model()
    }
}

/// Printer-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    /// Name of the loaded job
    pub job_name: String,
    /// Id of the loaded job
    #[serde(rename = "JobID")]
    pub job_id: String,
    /// Directory holding the loaded print data
    pub print_data_dir: PathBuf,
    /// Directory where hosts stage print data and settings files
    pub staging_dir: PathBuf,
    /// Whether the printer completed registration
    pub registered: bool,
    /// Ask the user to rate prints when registered
    pub collect_print_feedback: bool,

    /// Hardware revision; 0 lacks a rotation sensor and inverts the door switch
    pub hardware_rev: u32,
    /// Detect tray jams with the rotation sensor
    pub detect_jams: bool,
    /// Automatic unjam attempts before giving up
    pub max_unjam_tries: u32,

    /// Multiplier applied to computed motion time for motor timeouts
    pub motor_timeout_factor: f64,
    /// Lower bound for motor timeouts in seconds
    pub min_motor_timeout_sec: f64,
    /// Temperature ceiling in degrees Celsius
    pub max_temperature_c: f64,

    /// Layer thickness in microns
    pub layer_thickness_microns: i32,
    /// Number of burn-in layers after the first
    pub burn_in_layers: u32,
    /// Show the calibration prompt before the first layer
    pub calibrate_before_print: bool,
    /// Scale applied to slice images before projection
    pub image_scale_factor: f64,
    /// Remap slice images for the projector's pattern mode
    pub use_pattern_mode: bool,

    /// Z travel from home to the start position in microns
    pub max_z_travel_microns: i32,
    /// Height the build head is lifted for inspection in microns
    pub inspection_height_microns: i32,
    /// Tray rotation used while homing in millidegrees
    pub home_rotation_millidegrees: i32,
    /// Tray rotation jerk while homing
    pub home_rot_jerk: i32,
    /// Tray speed while homing
    #[serde(rename = "HomeRPM")]
    pub home_rpm: i32,
    /// Z jerk while homing
    pub home_z_jerk: i32,
    /// Z speed while homing in microns per second
    pub home_z_speed: i32,
    /// Tray rotation jerk when moving to start
    pub start_rot_jerk: i32,
    /// Tray speed when moving to start
    #[serde(rename = "StartRPM")]
    pub start_rpm: i32,
    /// Z jerk when moving to start
    pub start_z_jerk: i32,
    /// Z speed when moving to start in microns per second
    pub start_z_speed: i32,

    /// Parameters for the first layer
    pub first_layer: LayerTypeSettings,
    /// Parameters for burn-in layers
    pub burn_in_layer: LayerTypeSettings,
    /// Parameters for model layers
    pub model_layer: LayerTypeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            job_id: String::new(),
            print_data_dir: PathBuf::from(DEFAULT_PRINT_DATA_DIR),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            registered: false,
            collect_print_feedback: true,
            hardware_rev: 1,
            detect_jams: true,
            max_unjam_tries: 5,
            motor_timeout_factor: 1.1,
            min_motor_timeout_sec: 15.0,
            max_temperature_c: 80.0,
            layer_thickness_microns: 25,
            burn_in_layers: 1,
            calibrate_before_print: true,
            image_scale_factor: 1.0,
            use_pattern_mode: false,
            max_z_travel_microns: 160_000,
            inspection_height_microns: 60_000,
            home_rotation_millidegrees: 60_000,
            home_rot_jerk: 100_000,
            home_rpm: 5,
            home_z_jerk: 100_000,
            home_z_speed: 5000,
            start_rot_jerk: 100_000,
            start_rpm: 5,
            start_z_jerk: 100_000,
            start_z_speed: 5000,
            first_layer: LayerTypeSettings::first(),
            burn_in_layer: LayerTypeSettings::burn_in(),
            model_layer: LayerTypeSettings::model(),
        }
    }
}

impl Settings {
    /// Parameters for a class of layer
    pub fn layer(&self, layer_type: LayerType) -> &LayerTypeSettings {
        match layer_type {
            LayerType::First => &self.first_layer,
            LayerType::BurnIn => &self.burn_in_layer,
            LayerType::Model => &self.model_layer,
        }
    }

    /// Jam detection requires both the setting and a rotation sensor
    pub fn jam_detection_enabled(&self) -> bool {
        self.detect_jams && self.hardware_rev >= 1
    }

    /// Decode the door GPIO level for this hardware revision
    pub fn door_is_open(&self, level: u8) -> bool {
        let high = level == b'1' || level == 1;
        if self.hardware_rev == 0 {
            !high
        } else {
            high
        }
    }

    /// Load settings from a JSON file
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> SettingsResult<()> {
        if self.layer_thickness_microns <= 0 {
            return Err(SettingsError::invalid("LayerThicknessMicrons", "must be > 0"));
        }
        if self.max_unjam_tries == 0 {
            return Err(SettingsError::invalid("MaxUnjamTries", "must be >= 1"));
        }
        if self.motor_timeout_factor < 1.0 {
            return Err(SettingsError::invalid("MotorTimeoutFactor", "must be >= 1.0"));
        }
        if self.min_motor_timeout_sec <= 0.0 {
            return Err(SettingsError::invalid("MinMotorTimeoutSec", "must be > 0"));
        }
        if self.image_scale_factor <= 0.0 {
            return Err(SettingsError::invalid("ImageScaleFactor", "must be > 0"));
        }
        if self.max_z_travel_microns <= 0 {
            return Err(SettingsError::invalid("MaxZTravelMicrons", "must be > 0"));
        }
        for (name, value) in [
            ("HomeRPM", self.home_rpm),
            ("HomeZSpeed", self.home_z_speed),
            ("StartRPM", self.start_rpm),
            ("StartZSpeed", self.start_z_speed),
        ] {
            if value <= 0 {
                return Err(SettingsError::invalid(name, "must be > 0"));
            }
        }
        self.first_layer.validate("FirstLayer")?;
        self.burn_in_layer.validate("BurnInLayer")?;
        self.model_layer.validate("ModelLayer")?;
        Ok(())
    }
}
