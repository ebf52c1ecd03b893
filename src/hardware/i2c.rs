//! Software I2C master on three digital lines.
//!
//! The DAQ has no I2C peripheral, so SCL and SDA are toggled by hand. SDA is
//! wired twice: one output line drives it, one input line senses it for ACK
//! and read bits. A released SDA is a high output.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{self, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

/// Bit-bang failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitBangError {
    /// The slave did not pull SDA low on the ninth clock.
    NoAcknowledge(NoAcknowledgeSource),
    /// A line could not be driven or sampled.
    Pin,
}

impl i2c::Error for BitBangError {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            BitBangError::NoAcknowledge(source) => i2c::ErrorKind::NoAcknowledge(*source),
            BitBangError::Pin => i2c::ErrorKind::Bus,
        }
    }
}

/// Default half clock period in microseconds.
pub const DEFAULT_HALF_PERIOD_US: u32 = 5;

/// I2C master bit-banged on embedded-hal pins.
///
/// Generic over:
/// - `SCL`: clock line (`OutputPin`)
/// - `SDAO`: data line, driven side (`OutputPin`)
/// - `SDAI`: data line, sensed side (`InputPin`)
/// - `DELAY`: delay provider (`DelayNs`)
pub struct BitBangI2c<SCL, SDAO, SDAI, DELAY>
where
    SCL: OutputPin,
    SDAO: OutputPin,
    SDAI: InputPin,
    DELAY: DelayNs,
{
    scl: SCL,
    sda_out: SDAO,
    sda_in: SDAI,
    delay: DELAY,
    half_period_us: u32,
}

impl<SCL, SDAO, SDAI, DELAY> BitBangI2c<SCL, SDAO, SDAI, DELAY>
where
    SCL: OutputPin,
    SDAO: OutputPin,
    SDAI: InputPin,
    DELAY: DelayNs,
{
    /// Create a master with the default clock.
    pub fn new(scl: SCL, sda_out: SDAO, sda_in: SDAI, delay: DELAY) -> Self {
        Self {
            scl,
            sda_out,
            sda_in,
            delay,
            half_period_us: DEFAULT_HALF_PERIOD_US,
        }
    }

    /// Change the half clock period.
    pub fn with_half_period_us(mut self, half_period_us: u32) -> Self {
        self.half_period_us = half_period_us;
        self
    }

    /// Give the lines back.
    pub fn release(self) -> (SCL, SDAO, SDAI, DELAY) {
        (self.scl, self.sda_out, self.sda_in, self.delay)
    }

    fn wait(&mut self) {
        if self.half_period_us > 0 {
            self.delay.delay_us(self.half_period_us);
        }
    }

    fn scl(&mut self, high: bool) -> Result<(), BitBangError> {
        let result = if high { self.scl.set_high() } else { self.scl.set_low() };
        result.map_err(|_| BitBangError::Pin)
    }

    fn sda(&mut self, high: bool) -> Result<(), BitBangError> {
        let result = if high {
            self.sda_out.set_high()
        } else {
            self.sda_out.set_low()
        };
        result.map_err(|_| BitBangError::Pin)
    }

    /// START (or repeated START): SDA falls while SCL is high.
    fn start(&mut self) -> Result<(), BitBangError> {
        self.sda(true)?;
        self.scl(true)?;
        self.wait();
        self.sda(false)?;
        self.wait();
        self.scl(false)?;
        self.wait();
        Ok(())
    }

    /// STOP: SDA rises while SCL is high.
    fn stop(&mut self) -> Result<(), BitBangError> {
        self.sda(false)?;
        self.scl(true)?;
        self.wait();
        self.sda(true)?;
        self.wait();
        Ok(())
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), BitBangError> {
        self.sda(bit)?;
        self.wait();
        self.scl(true)?;
        self.wait();
        self.scl(false)?;
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, BitBangError> {
        self.sda(true)?;
        self.scl(true)?;
        self.wait();
        let bit = self.sda_in.is_high().map_err(|_| BitBangError::Pin)?;
        self.scl(false)?;
        Ok(bit)
    }

    /// Send a byte MSB first; returns whether the slave acknowledged.
    fn write_byte(&mut self, byte: u8) -> Result<bool, BitBangError> {
        for shift in (0..8).rev() {
            self.write_bit(byte & (1 << shift) != 0)?;
        }
        Ok(!self.read_bit()?)
    }

    fn read_byte(&mut self, ack: bool) -> Result<u8, BitBangError> {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | self.read_bit()? as u8;
        }
        // ACK is SDA low
        self.write_bit(!ack)?;
        Ok(byte)
    }

    fn run_operations(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), BitBangError> {
        let mut previous_read: Option<bool> = None;

        for index in 0..operations.len() {
            let is_read = matches!(operations[index], Operation::Read(_));
            let next_is_read = matches!(operations.get(index + 1), Some(Operation::Read(_)));

            // Adjacent operations of the same kind share one frame
            if previous_read != Some(is_read) {
                self.start()?;
                if !self.write_byte((address << 1) | is_read as u8)? {
                    return Err(BitBangError::NoAcknowledge(NoAcknowledgeSource::Address));
                }
            }

            match &mut operations[index] {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        if !self.write_byte(byte)? {
                            return Err(BitBangError::NoAcknowledge(NoAcknowledgeSource::Data));
                        }
                    }
                }
                Operation::Read(buffer) => {
                    let len = buffer.len();
                    for (i, slot) in buffer.iter_mut().enumerate() {
                        // NACK the very last byte of a read run
                        let last = i + 1 == len && !next_is_read;
                        *slot = self.read_byte(!last)?;
                    }
                }
            }

            previous_read = Some(is_read);
        }

        Ok(())
    }
}

impl<SCL, SDAO, SDAI, DELAY> ErrorType for BitBangI2c<SCL, SDAO, SDAI, DELAY>
where
    SCL: OutputPin,
    SDAO: OutputPin,
    SDAI: InputPin,
    DELAY: DelayNs,
{
    type Error = BitBangError;
}

impl<SCL, SDAO, SDAI, DELAY> I2c<SevenBitAddress> for BitBangI2c<SCL, SDAO, SDAI, DELAY>
where
    SCL: OutputPin,
    SDAO: OutputPin,
    SDAI: InputPin,
    DELAY: DelayNs,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let result = self.run_operations(address, operations);
        // Always free the bus, even after a NACK
        let stop = self.stop();
        result.and(stop)
    }
}
