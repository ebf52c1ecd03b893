//! Relay board driven by the MCP23017 port B.

use embedded_hal::i2c::I2c;
use tracing::debug;

use crate::config::{DaqPin, Relay};
use crate::error::HardwareError;

use super::daq::{DaqLine, SharedDaq};
use super::i2c::BitBangI2c;
use super::mcp23017::{Mcp23017, Port};
use super::StdDelay;

/// Switching of the bench relays.
pub trait RelayControl {
    /// Energise or release one relay.
    fn set(&mut self, relay: Relay, on: bool) -> Result<(), HardwareError>;

    /// Release every relay.
    fn all_off(&mut self) -> Result<(), HardwareError> {
        for relay in Relay::ALL {
            self.set(relay, false)?;
        }
        Ok(())
    }
}

/// Relays behind an MCP23017 on an I2C bus.
pub struct RelayBank<I2C: I2c> {
    i2c: I2C,
    expander: Mcp23017,
}

/// Relay bank bit-banged on the DAQ lines.
pub type DaqRelayBank = RelayBank<BitBangI2c<DaqLine, DaqLine, DaqLine, StdDelay>>;

impl<I2C: I2c> RelayBank<I2C> {
    /// Take the bus, release every relay and make port B outputs.
    ///
    /// The latch is cleared before the direction change so no relay clicks
    /// while the pins switch to outputs.
    pub fn new(mut i2c: I2C) -> Result<Self, HardwareError> {
        let mut expander = Mcp23017::new(Relay::EnAutomatic24V.address());
        let address = expander.address();
        expander
            .write_port(&mut i2c, Port::B, 0x00)
            .map_err(|e| i2c_error(address, e))?;
        expander
            .set_port_direction(&mut i2c, Port::B, 0x00)
            .map_err(|e| i2c_error(address, e))?;
        debug!(address = address, "relay expander configured");
        Ok(Self { i2c, expander })
    }

    /// Whether a relay is currently energised.
    pub fn is_on(&self, relay: Relay) -> bool {
        let pin = relay.pin();
        self.expander.latch(pin.port()) & (1 << pin.bit()) != 0
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RelayControl for RelayBank<I2C> {
    fn set(&mut self, relay: Relay, on: bool) -> Result<(), HardwareError> {
        let address = self.expander.address();
        self.expander
            .set_pin(&mut self.i2c, relay.pin(), on)
            .map_err(|e| i2c_error(address, e))?;
        debug!(relay = ?relay, on = on, "relay switched");
        Ok(())
    }

    fn all_off(&mut self) -> Result<(), HardwareError> {
        let address = self.expander.address();
        self.expander
            .write_port(&mut self.i2c, Port::B, 0x00)
            .map_err(|e| i2c_error(address, e))
    }
}

/// Build the relay bank on the DAQ I2C lines of `device`.
pub fn daq_relay_bank(daq: &SharedDaq, device: &str) -> Result<DaqRelayBank, HardwareError> {
    let i2c = BitBangI2c::new(
        DaqLine::new(daq.clone(), device, DaqPin::I2cScl),
        DaqLine::new(daq.clone(), device, DaqPin::I2cSdaOut),
        DaqLine::new(daq.clone(), device, DaqPin::I2cSdaIn),
        StdDelay,
    )
    // The DAQ call latency already exceeds the I2C half period
    .with_half_period_us(0);
    RelayBank::new(i2c)
}

fn i2c_error<E: embedded_hal::i2c::Error>(address: u8, error: E) -> HardwareError {
    HardwareError::I2c {
        address,
        reason: format!("{:?}", error.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mcp23017::register;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    fn bring_up() -> Vec<Transaction> {
        vec![
            Transaction::write(0x20, vec![register::OLATB, 0x00]),
            Transaction::write(0x20, vec![register::IODIRB, 0x00]),
        ]
    }

    #[test]
    fn test_bring_up_then_switch() {
        let mut expectations = bring_up();
        expectations.push(Transaction::write(0x20, vec![register::OLATB, 0b0000_0010]));
        expectations.push(Transaction::write(0x20, vec![register::OLATB, 0b0010_0010]));
        let mut bank = RelayBank::new(I2cMock::new(&expectations)).unwrap();

        bank.set(Relay::En24V, true).unwrap();
        bank.set(Relay::EnVccUsb, true).unwrap();

        assert!(bank.is_on(Relay::En24V));
        assert!(!bank.is_on(Relay::EnBtl));
        bank.release().done();
    }

    #[test]
    fn test_all_off_clears_port() {
        let mut expectations = bring_up();
        expectations.push(Transaction::write(0x20, vec![register::OLATB, 0b1000_0000]));
        expectations.push(Transaction::write(0x20, vec![register::OLATB, 0x00]));
        let mut bank = RelayBank::new(I2cMock::new(&expectations)).unwrap();

        bank.set(Relay::EnAutomaticGndInputs, true).unwrap();
        bank.all_off().unwrap();

        assert!(!bank.is_on(Relay::EnAutomaticGndInputs));
        bank.release().done();
    }

    #[test]
    fn test_bus_failure_is_reported() {
        let expectations = [Transaction::write(0x20, vec![register::OLATB, 0x00])
            .with_error(ErrorKind::Other)];
        let mut i2c = I2cMock::new(&expectations);

        let result = RelayBank::new(&mut i2c);
        assert!(matches!(result, Err(HardwareError::I2c { address: 0x20, .. })));
        i2c.done();
    }
}
