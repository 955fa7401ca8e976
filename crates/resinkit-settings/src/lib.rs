//! ResinKit Settings Crate
//!
//! Printer-wide settings, the shared settings store, the per-layer override
//! table carried by print data, and the settings of the layer in progress.

pub mod config;
pub mod error;
pub mod layer_settings;
pub mod per_layer;
pub mod store;

pub use config::{LayerTypeSettings, Settings};
pub use error::{SettingsError, SettingsResult};
pub use layer_settings::{
    estimate_remaining_seconds, rotation_seconds, z_seconds, CurrentLayerSettings, MoveProfile,
};
pub use per_layer::{LayerOverrides, PerLayerSettings};
pub use store::SettingsStore;
