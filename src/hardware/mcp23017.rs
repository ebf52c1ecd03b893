//! MCP23017 16-bit GPIO expander.
//!
//! The driver only keeps a shadow of the direction and latch registers; every
//! call borrows the bus, so the same bus can be shared with other devices.

use embedded_hal::i2c::I2c;

/// Address with A0..A2 tied low.
pub const DEFAULT_ADDRESS: u8 = 0x20;

/// Register map (IOCON.BANK = 0).
pub mod register {
    /// Direction, port A (1 = input).
    pub const IODIRA: u8 = 0x00;
    /// Direction, port B (1 = input).
    pub const IODIRB: u8 = 0x01;
    /// Pin levels, port A.
    pub const GPIOA: u8 = 0x12;
    /// Pin levels, port B.
    pub const GPIOB: u8 = 0x13;
    /// Output latch, port A.
    pub const OLATA: u8 = 0x14;
    /// Output latch, port B.
    pub const OLATB: u8 = 0x15;
}

/// Expander port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// GPA0..GPA7
    A,
    /// GPB0..GPB7
    B,
}

impl Port {
    const fn index(self) -> usize {
        match self {
            Port::A => 0,
            Port::B => 1,
        }
    }

    const fn iodir(self) -> u8 {
        match self {
            Port::A => register::IODIRA,
            Port::B => register::IODIRB,
        }
    }

    const fn gpio(self) -> u8 {
        match self {
            Port::A => register::GPIOA,
            Port::B => register::GPIOB,
        }
    }

    const fn olat(self) -> u8 {
        match self {
            Port::A => register::OLATA,
            Port::B => register::OLATB,
        }
    }
}

/// Expander pin.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
}

impl Pin {
    /// Port the pin belongs to.
    pub const fn port(self) -> Port {
        if (self as u8) < 8 {
            Port::A
        } else {
            Port::B
        }
    }

    /// Bit index within its port.
    pub const fn bit(self) -> u8 {
        (self as u8) % 8
    }

    const fn mask(self) -> u8 {
        1 << self.bit()
    }
}

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Driven by the expander.
    Output,
    /// Sensed by the expander.
    Input,
}

/// Shadowed register state of one expander.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mcp23017 {
    address: u8,
    iodir: [u8; 2],
    olat: [u8; 2],
}

impl Default for Mcp23017 {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

impl Mcp23017 {
    /// Power-on state: every pin an input, latches low.
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            iodir: [0xFF; 2],
            olat: [0x00; 2],
        }
    }

    /// 7-bit bus address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Last latch value written to a port.
    pub fn latch(&self, port: Port) -> u8 {
        self.olat[port.index()]
    }

    /// Write a whole port direction register (1 = input).
    pub fn set_port_direction<I2C: I2c>(
        &mut self,
        i2c: &mut I2C,
        port: Port,
        iodir: u8,
    ) -> Result<(), I2C::Error> {
        i2c.write(self.address, &[port.iodir(), iodir])?;
        self.iodir[port.index()] = iodir;
        Ok(())
    }

    /// Change the direction of one pin.
    pub fn set_direction<I2C: I2c>(
        &mut self,
        i2c: &mut I2C,
        pin: Pin,
        direction: Direction,
    ) -> Result<(), I2C::Error> {
        let port = pin.port();
        let current = self.iodir[port.index()];
        let iodir = match direction {
            Direction::Input => current | pin.mask(),
            Direction::Output => current & !pin.mask(),
        };
        self.set_port_direction(i2c, port, iodir)
    }

    /// Write a whole output latch.
    pub fn write_port<I2C: I2c>(
        &mut self,
        i2c: &mut I2C,
        port: Port,
        value: u8,
    ) -> Result<(), I2C::Error> {
        i2c.write(self.address, &[port.olat(), value])?;
        self.olat[port.index()] = value;
        Ok(())
    }

    /// Drive one output pin, keeping the other latch bits.
    pub fn set_pin<I2C: I2c>(&mut self, i2c: &mut I2C, pin: Pin, high: bool) -> Result<(), I2C::Error> {
        let port = pin.port();
        let current = self.olat[port.index()];
        let value = if high {
            current | pin.mask()
        } else {
            current & !pin.mask()
        };
        self.write_port(i2c, port, value)
    }

    /// Read the pin levels of a port.
    pub fn read_port<I2C: I2c>(&self, i2c: &mut I2C, port: Port) -> Result<u8, I2C::Error> {
        let mut value = [0u8; 1];
        i2c.write_read(self.address, &[port.gpio()], &mut value)?;
        Ok(value[0])
    }

    /// Read one pin level.
    pub fn read_pin<I2C: I2c>(&self, i2c: &mut I2C, pin: Pin) -> Result<bool, I2C::Error> {
        Ok(self.read_port(i2c, pin.port())? & pin.mask() != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn test_pin_layout() {
        assert_eq!(Pin::A3.port(), Port::A);
        assert_eq!(Pin::A3.bit(), 3);
        assert_eq!(Pin::B0.port(), Port::B);
        assert_eq!(Pin::B7.bit(), 7);
    }

    #[test]
    fn test_set_pin_keeps_other_bits() {
        let expectations = [
            Transaction::write(0x20, vec![register::OLATB, 0b0000_0100]),
            Transaction::write(0x20, vec![register::OLATB, 0b1000_0100]),
            Transaction::write(0x20, vec![register::OLATB, 0b1000_0000]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut expander = Mcp23017::default();

        expander.set_pin(&mut i2c, Pin::B2, true).unwrap();
        expander.set_pin(&mut i2c, Pin::B7, true).unwrap();
        expander.set_pin(&mut i2c, Pin::B2, false).unwrap();

        assert_eq!(expander.latch(Port::B), 0b1000_0000);
        assert_eq!(expander.latch(Port::A), 0);
        i2c.done();
    }

    #[test]
    fn test_direction_per_port() {
        let expectations = [
            Transaction::write(0x21, vec![register::IODIRA, 0b1111_1110]),
            Transaction::write(0x21, vec![register::IODIRB, 0x00]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut expander = Mcp23017::new(0x21);

        expander.set_direction(&mut i2c, Pin::A0, Direction::Output).unwrap();
        expander.set_port_direction(&mut i2c, Port::B, 0x00).unwrap();
        i2c.done();
    }

    #[test]
    fn test_read_pin() {
        let expectations = [Transaction::write_read(
            0x20,
            vec![register::GPIOA],
            vec![0b0001_0000],
        )];
        let mut i2c = I2cMock::new(&expectations);
        let expander = Mcp23017::default();

        assert!(expander.read_pin(&mut i2c, Pin::A4).unwrap());
        i2c.done();
    }
}
