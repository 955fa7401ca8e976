//! I2C device contract
//!
//! The bus primitives themselves live outside this crate. Devices used by the
//! printer (motor controller, front panel) only need to write a command frame
//! and read a single status register.

use parking_lot::Mutex;
use resinkit_core::{thread_safe_vec, HardwareError, ThreadSafeVec};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Low-level I2C device interface
pub trait I2cDevice: Send {
    /// 7-bit device address
    fn address(&self) -> u8;

    /// Write a raw frame; the first byte selects the register
    fn write(&mut self, data: &[u8]) -> Result<(), HardwareError>;

    /// Read one byte from a register
    fn read_register(&mut self, register: u8) -> Result<u8, HardwareError>;
}

/// Bounded ready polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        Self {
            attempts: 100,
            delay: Duration::from_millis(10),
        }
    }
}

/// Poll `register` until `is_ready` accepts its value
///
/// Read errors count as failed attempts. Gives up with
/// [`HardwareError::NotReady`] once the attempts are used up.
pub fn wait_until_ready<F>(
    device: &mut dyn I2cDevice,
    register: u8,
    policy: ReadyPolicy,
    is_ready: F,
) -> Result<(), HardwareError>
where
    F: Fn(u8) -> bool,
{
    for attempt in 1..=policy.attempts {
        match device.read_register(register) {
            Ok(value) if is_ready(value) => return Ok(()),
            Ok(_) => {}
            Err(e) => tracing::debug!(
                "Ready poll {} of device 0x{:02X} failed: {}",
                attempt,
                device.address(),
                e
            ),
        }
        if attempt < policy.attempts {
            std::thread::sleep(policy.delay);
        }
    }
    Err(HardwareError::NotReady {
        address: device.address(),
        attempts: policy.attempts,
    })
}

/// Device that accepts every write and reads zero
#[derive(Debug, Clone, Default)]
pub struct NoOpI2cDevice {
    address: u8,
}

impl NoOpI2cDevice {
    pub fn new(address: u8) -> Self {
        Self { address }
    }
}

impl I2cDevice for NoOpI2cDevice {
    fn address(&self) -> u8 {
        self.address
    }

    fn write(&mut self, _data: &[u8]) -> Result<(), HardwareError> {
        Ok(())
    }

    fn read_register(&mut self, _register: u8) -> Result<u8, HardwareError> {
        Ok(0)
    }
}

/// Simulated device that records writes and serves scripted register values
///
/// Clones share the recording, so one clone can be handed to a driver while
/// another inspects or scripts it.
#[derive(Clone)]
pub struct SimulatedI2cDevice {
    address: u8,
    writes: ThreadSafeVec<Vec<u8>>,
    reads: Arc<Mutex<HashMap<u8, VecDeque<u8>>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl SimulatedI2cDevice {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            writes: thread_safe_vec(),
            reads: Arc::new(Mutex::new(HashMap::new())),
            fail_writes: Arc::new(Mutex::new(false)),
        }
    }

    /// Queue a value to be returned by the next read of `register`
    ///
    /// Once the queue for a register is empty, reads return 0.
    pub fn push_read(&self, register: u8, value: u8) {
        self.reads.lock().entry(register).or_default().push_back(value);
    }

    /// Make subsequent writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Frames written so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }
}

impl I2cDevice for SimulatedI2cDevice {
    fn address(&self) -> u8 {
        self.address
    }

    fn write(&mut self, data: &[u8]) -> Result<(), HardwareError> {
        if *self.fail_writes.lock() {
            return Err(HardwareError::I2cWrite {
                address: self.address,
                reason: "simulated write failure".to_string(),
            });
        }
        self.writes.lock().push(data.to_vec());
        Ok(())
    }

    fn read_register(&mut self, register: u8) -> Result<u8, HardwareError> {
        Ok(self
            .reads
            .lock()
            .get_mut(&register)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(0))
    }
}
