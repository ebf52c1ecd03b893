//! Bench hardware: DAQ seam, bit-banged I2C, GPIO expander and relays.

pub mod daq;
pub mod i2c;
pub mod mcp23017;
pub mod relays;

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

pub use daq::{Daq, DaqLine, DeviceInfo, SharedDaq, TaskKind, DAQ_PRODUCT_TYPE};
pub use i2c::{BitBangError, BitBangI2c};
pub use mcp23017::Mcp23017;
pub use relays::{daq_relay_bank, DaqRelayBank, RelayBank, RelayControl};

/// Blocking delay on the host clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
