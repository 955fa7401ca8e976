//! Per-layer override table
//!
//! Print data may carry a JSON object keyed by 1-based layer number, each
//! value naming only the parameters it overrides for that layer:
//!
//! ```json
//! { "1": { "ExposureSec": 6.0 }, "40": { "SeparationRPM": 5, "ZLiftMicrons": 3000 } }
//! ```

use crate::config::LayerTypeSettings;
use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters a single layer may override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct LayerOverrides {
    pub exposure_sec: Option<f64>,
    pub press_microns: Option<i32>,
    pub press_speed: Option<i32>,
    pub press_wait_sec: Option<f64>,
    pub unpress_speed: Option<i32>,
    pub approach_wait_sec: Option<f64>,
    pub separation_rot_jerk: Option<i32>,
    #[serde(rename = "SeparationRPM")]
    pub separation_rpm: Option<i32>,
    pub rotation_millidegrees: Option<i32>,
    pub separation_z_jerk: Option<i32>,
    pub separation_z_speed: Option<i32>,
    pub z_lift_microns: Option<i32>,
    pub approach_rot_jerk: Option<i32>,
    #[serde(rename = "ApproachRPM")]
    pub approach_rpm: Option<i32>,
    pub approach_z_jerk: Option<i32>,
    pub approach_z_speed: Option<i32>,
}

impl LayerOverrides {
    /// Overlay the exposure-side parameters (press, waits, exposure)
    pub fn apply_exposure(&self, target: &mut LayerTypeSettings) {
        overlay(&mut target.exposure_sec, self.exposure_sec);
        overlay(&mut target.press_microns, self.press_microns);
        overlay(&mut target.press_speed, self.press_speed);
        overlay(&mut target.press_wait_sec, self.press_wait_sec);
        overlay(&mut target.unpress_speed, self.unpress_speed);
        overlay(&mut target.approach_wait_sec, self.approach_wait_sec);
    }

    /// Overlay the post-exposure motion parameters (separation, approach)
    pub fn apply_motion(&self, target: &mut LayerTypeSettings) {
        overlay(&mut target.separation_rot_jerk, self.separation_rot_jerk);
        overlay(&mut target.separation_rpm, self.separation_rpm);
        overlay(&mut target.rotation_millidegrees, self.rotation_millidegrees);
        overlay(&mut target.separation_z_jerk, self.separation_z_jerk);
        overlay(&mut target.separation_z_speed, self.separation_z_speed);
        overlay(&mut target.z_lift_microns, self.z_lift_microns);
        overlay(&mut target.approach_rot_jerk, self.approach_rot_jerk);
        overlay(&mut target.approach_rpm, self.approach_rpm);
        overlay(&mut target.approach_z_jerk, self.approach_z_jerk);
        overlay(&mut target.approach_z_speed, self.approach_z_speed);
    }

    fn validate(&self, layer: u32) -> SettingsResult<()> {
        let positive = [
            ("PressSpeed", self.press_speed),
            ("UnpressSpeed", self.unpress_speed),
            ("SeparationRPM", self.separation_rpm),
            ("SeparationZSpeed", self.separation_z_speed),
            ("ApproachRPM", self.approach_rpm),
            ("ApproachZSpeed", self.approach_z_speed),
        ];
        for (name, value) in positive {
            if matches!(value, Some(v) if v <= 0) {
                return Err(SettingsError::invalid(
                    &format!("{layer}.{name}"),
                    "must be > 0",
                ));
            }
        }
        if matches!(self.exposure_sec, Some(v) if v <= 0.0) {
            return Err(SettingsError::invalid(
                &format!("{layer}.ExposureSec"),
                "must be > 0",
            ));
        }
        Ok(())
    }
}

fn overlay<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

/// Override table for the loaded job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerLayerSettings {
    layers: BTreeMap<u32, LayerOverrides>,
}

impl PerLayerSettings {
    /// Parse a table; an empty or whitespace-only document yields no overrides
    pub fn from_json(text: &str) -> SettingsResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, LayerOverrides> = serde_json::from_str(text)?;
        let mut layers = BTreeMap::new();
        for (key, overrides) in raw {
            let layer: u32 = key
                .trim()
                .parse()
                .map_err(|_| SettingsError::invalid(&key, "layer key must be a number"))?;
            if layer == 0 {
                return Err(SettingsError::invalid(&key, "layers are numbered from 1"));
            }
            overrides.validate(layer)?;
            layers.insert(layer, overrides);
        }
        Ok(Self { layers })
    }

    /// Overrides for a layer, if any
    pub fn get(&self, layer: u32) -> Option<&LayerOverrides> {
        self.layers.get(&layer)
    }

    pub fn insert(&mut self, layer: u32, overrides: LayerOverrides) {
        self.layers.insert(layer, overrides);
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let table = PerLayerSettings::from_json(
            r#"{"1": {"ExposureSec": 6.0}, "40": {"SeparationRPM": 5, "ZLiftMicrons": 3000}}"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).unwrap().exposure_sec, Some(6.0));
        assert_eq!(table.get(40).unwrap().separation_rpm, Some(5));
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_empty_document() {
        assert!(PerLayerSettings::from_json("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_keys_and_values() {
        assert!(PerLayerSettings::from_json(r#"{"abc": {}}"#).is_err());
        assert!(PerLayerSettings::from_json(r#"{"0": {}}"#).is_err());
        assert!(PerLayerSettings::from_json(r#"{"3": {"ApproachRPM": 0}}"#).is_err());
        assert!(PerLayerSettings::from_json(r#"{"3": {"Bogus": 1}}"#).is_err());
    }

    #[test]
    fn test_overlay_split() {
        let overrides = LayerOverrides {
            exposure_sec: Some(9.0),
            z_lift_microns: Some(4000),
            ..Default::default()
        };
        let mut settings = LayerTypeSettings::default();
        overrides.apply_exposure(&mut settings);
        assert_eq!(settings.exposure_sec, 9.0);
        assert_eq!(settings.z_lift_microns, 1000);
        overrides.apply_motion(&mut settings);
        assert_eq!(settings.z_lift_microns, 4000);
    }
}
