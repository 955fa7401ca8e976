//! Printer-wide constants

use std::time::Duration;

/// Firmware version reported on the version screen
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interval between temperature measurements
pub const TEMPERATURE_MEASUREMENT_INTERVAL: Duration = Duration::from_secs(20);

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/var/lib/resinkit/settings.json";

/// Default directory holding the loaded print data
pub const DEFAULT_PRINT_DATA_DIR: &str = "/var/lib/resinkit/print_data";

/// Default directory where hosts stage print data for loading
pub const DEFAULT_STAGING_DIR: &str = "/var/lib/resinkit/staging";

/// Name of a staged settings file applied by `ApplySettings`
pub const STAGED_SETTINGS_FILE: &str = "settings.json";

/// Directory on a USB drive searched for print data
pub const USB_PRINT_DATA_DIR: &str = "resinkit";
