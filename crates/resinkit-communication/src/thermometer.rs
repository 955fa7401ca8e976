//! Thermometer contract
//!
//! The printer uses a 1-wire sensor exposed by the kernel as a text file:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```

use parking_lot::Mutex;
use resinkit_core::HardwareError;
use std::path::PathBuf;
use std::sync::Arc;

/// Temperature source
pub trait Thermometer: Send {
    /// Current temperature in degrees Celsius
    fn read_celsius(&mut self) -> Result<f64, HardwareError>;
}

/// 1-wire sensor read through sysfs
#[derive(Debug, Clone)]
pub struct OneWireThermometer {
    path: PathBuf,
}

impl OneWireThermometer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Thermometer for OneWireThermometer {
    fn read_celsius(&mut self) -> Result<f64, HardwareError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| HardwareError::Thermometer {
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        parse_one_wire(&text)
    }
}

/// Parse the sysfs text of a 1-wire sensor
pub fn parse_one_wire(text: &str) -> Result<f64, HardwareError> {
    let mut lines = text.lines();
    let crc_ok = lines
        .next()
        .map(|line| line.trim_end().ends_with("YES"))
        .unwrap_or(false);
    if !crc_ok {
        return Err(HardwareError::Thermometer {
            reason: "sensor reported a bad CRC".to_string(),
        });
    }
    let milli = lines
        .next()
        .and_then(|line| line.split("t=").nth(1))
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| HardwareError::Thermometer {
            reason: "no temperature value in sensor output".to_string(),
        })?;
    Ok(milli as f64 / 1000.0)
}

/// Thermometer with a settable reading, shared between clones
#[derive(Debug, Clone)]
pub struct SimulatedThermometer {
    reading: Arc<Mutex<Result<f64, String>>>,
}

impl SimulatedThermometer {
    pub fn new(celsius: f64) -> Self {
        Self {
            reading: Arc::new(Mutex::new(Ok(celsius))),
        }
    }

    pub fn set(&self, celsius: f64) {
        *self.reading.lock() = Ok(celsius);
    }

    /// Make subsequent reads fail
    pub fn fail(&self, reason: impl Into<String>) {
        *self.reading.lock() = Err(reason.into());
    }
}

impl Thermometer for SimulatedThermometer {
    fn read_celsius(&mut self) -> Result<f64, HardwareError> {
        self.reading
            .lock()
            .clone()
            .map_err(|reason| HardwareError::Thermometer { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    #[test]
    fn test_parse_sample() {
        assert_eq!(parse_one_wire(SAMPLE).unwrap(), 23.125);
    }

    #[test]
    fn test_parse_negative() {
        let text = "aa : crc=aa YES\naa t=-1500\n";
        assert_eq!(parse_one_wire(text).unwrap(), -1.5);
    }

    #[test]
    fn test_parse_rejects_bad_crc() {
        let text = "72 01 : crc=57 NO\n72 01 t=23125\n";
        assert!(parse_one_wire(text).is_err());
        assert!(parse_one_wire("").is_err());
        assert!(parse_one_wire("x YES\nno value\n").is_err());
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let mut thermometer = OneWireThermometer::new(file.path());
        assert_eq!(thermometer.read_celsius().unwrap(), 23.125);
    }

    #[test]
    fn test_missing_file() {
        let mut thermometer = OneWireThermometer::new("/nonexistent/w1_slave");
        assert!(thermometer.read_celsius().is_err());
    }

    #[test]
    fn test_simulated_shared_reading() {
        let thermometer = SimulatedThermometer::new(25.0);
        let mut handle = thermometer.clone();
        thermometer.set(90.0);
        assert_eq!(handle.read_celsius().unwrap(), 90.0);
        thermometer.fail("unplugged");
        assert!(handle.read_celsius().is_err());
    }
}
