//! Pin assignments of the bench wiring.

use crate::hardware::mcp23017::{Pin, DEFAULT_ADDRESS};

/// DAQ USB-6000 line assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaqPin {
    /// I2C clock (yellow wire).
    I2cScl,
    /// I2C data, driven side (blue wire).
    I2cSdaOut,
    /// I2C data, sensed side for ACK and reads (blue wire).
    I2cSdaIn,
    /// Spare digital line.
    P03,
    /// Spare analog input.
    Ai0,
    /// Spare analog input.
    Ai1,
    /// Spare analog input.
    Ai2,
    /// Spare analog input.
    Ai3,
    /// AT LED supply measurement.
    MeasureAt,
    /// IVE2 input rail measurement.
    MeasureIve2,
    /// IVF input rail measurement.
    MeasureIvf,
    /// IVE1 input rail measurement.
    MeasureIve1,
}

impl DaqPin {
    /// Physical line name as understood by the DAQ driver.
    pub const fn line(self) -> &'static str {
        match self {
            DaqPin::I2cScl => "port0/line0",
            DaqPin::I2cSdaOut => "port0/line1",
            DaqPin::I2cSdaIn => "port0/line2",
            DaqPin::P03 => "port0/line3",
            DaqPin::Ai0 => "ai0",
            DaqPin::Ai1 => "ai1",
            DaqPin::Ai2 => "ai2",
            DaqPin::Ai3 => "ai3",
            DaqPin::MeasureAt => "ai4",
            DaqPin::MeasureIve2 => "ai5",
            DaqPin::MeasureIvf => "ai6",
            DaqPin::MeasureIve1 => "ai7",
        }
    }
}

/// Relays of the 8-channel relay board, driven by the MCP23017 port B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relay {
    /// Relay 0: automatic 24 V supply.
    EnAutomatic24V,
    /// Relay 1: 24 V supply to the board.
    En24V,
    /// Relay 2: automatic bootloader strap.
    EnAutomaticBtl,
    /// Relay 3: bootloader strap.
    EnBtl,
    /// Relay 4: not wired.
    SpareB4,
    /// Relay 5: USB Vcc.
    EnVccUsb,
    /// Relay 6: ground reference of IVE1/IVE2/IVF, measurement path.
    EnGndInputs2,
    /// Relay 7: automatic ground of IVE1/IVE2/IVF.
    EnAutomaticGndInputs,
}

impl Relay {
    /// Every relay, in board order.
    pub const ALL: [Relay; 8] = [
        Relay::EnAutomatic24V,
        Relay::En24V,
        Relay::EnAutomaticBtl,
        Relay::EnBtl,
        Relay::SpareB4,
        Relay::EnVccUsb,
        Relay::EnGndInputs2,
        Relay::EnAutomaticGndInputs,
    ];

    /// I2C address of the expander driving this relay.
    pub const fn address(self) -> u8 {
        DEFAULT_ADDRESS
    }

    /// Expander pin driving this relay.
    pub const fn pin(self) -> Pin {
        match self {
            Relay::EnAutomatic24V => Pin::B0,
            Relay::En24V => Pin::B1,
            Relay::EnAutomaticBtl => Pin::B2,
            Relay::EnBtl => Pin::B3,
            Relay::SpareB4 => Pin::B4,
            Relay::EnVccUsb => Pin::B5,
            Relay::EnGndInputs2 => Pin::B6,
            Relay::EnAutomaticGndInputs => Pin::B7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mcp23017::Port;

    #[test]
    fn test_relays_are_on_port_b_in_order() {
        for (bit, relay) in Relay::ALL.iter().enumerate() {
            assert_eq!(relay.pin().port(), Port::B);
            assert_eq!(relay.pin().bit() as usize, bit);
            assert_eq!(relay.address(), 0x20);
        }
    }

    #[test]
    fn test_measurement_lines() {
        assert_eq!(DaqPin::MeasureIve1.line(), "ai7");
        assert_eq!(DaqPin::I2cSdaIn.line(), "port0/line2");
    }
}
