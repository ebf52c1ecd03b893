//! Data-acquisition device seam.
//!
//! The vendor driver lives outside this crate; it is reached through [`Daq`].
//! Digital lines are also exposed as embedded-hal pins so the I2C bit-bang
//! can run on them.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::digital::{self, ErrorType, InputPin, OutputPin};

use crate::config::DaqPin;
use crate::error::HardwareError;

/// Model the bench expects.
pub const DAQ_PRODUCT_TYPE: &str = "USB-6000";

/// Kind of task to create on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Digital output.
    DigitalOutput,
    /// Digital input.
    DigitalInput,
    /// Analog input.
    AnalogInput,
}

/// Identity of a DAQ device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Model, e.g. `USB-6000`.
    pub product_type: String,
    /// Serial number as reported by the driver.
    pub serial_number: String,
    /// Last external calibration, when known.
    pub calibration_date: Option<String>,
}

/// Operations the bench needs from the DAQ driver.
pub trait Daq {
    /// Names of the devices the driver can see.
    fn list_devices(&mut self) -> Result<Vec<String>, HardwareError>;

    /// Start managing a device.
    fn add_device(&mut self, device: &str) -> Result<(), HardwareError>;

    /// Stop managing a device.
    fn remove_device(&mut self, device: &str);

    /// Identity of a managed device.
    fn device_info(&mut self, device: &str) -> Result<DeviceInfo, HardwareError>;

    /// Create a task for the whole run on one line.
    fn create_task(&mut self, device: &str, line: &str, kind: TaskKind)
        -> Result<(), HardwareError>;

    /// Drive a digital output line.
    fn write_digital(&mut self, device: &str, line: &str, high: bool) -> Result<(), HardwareError>;

    /// Sample a digital input line.
    fn read_digital(&mut self, device: &str, line: &str) -> Result<bool, HardwareError>;

    /// Sample an analog input line, in volts.
    fn read_analog(&mut self, device: &str, line: &str) -> Result<f64, HardwareError>;

    /// Close every task on every device.
    fn close_all(&mut self);
}

/// DAQ handle shared by the I2C lines and the measurement code.
pub type SharedDaq = Rc<RefCell<dyn Daq>>;

impl digital::Error for HardwareError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// One DAQ digital line seen as an embedded-hal pin.
pub struct DaqLine {
    daq: SharedDaq,
    device: String,
    line: &'static str,
}

impl DaqLine {
    /// Wrap a line of a managed device.
    pub fn new(daq: SharedDaq, device: impl Into<String>, pin: DaqPin) -> Self {
        Self {
            daq,
            device: device.into(),
            line: pin.line(),
        }
    }

    /// Physical line name.
    pub fn line(&self) -> &'static str {
        self.line
    }
}

impl ErrorType for DaqLine {
    type Error = HardwareError;
}

impl OutputPin for DaqLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.daq.borrow_mut().write_digital(&self.device, self.line, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.daq.borrow_mut().write_digital(&self.device, self.line, true)
    }
}

impl InputPin for DaqLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.daq.borrow_mut().read_digital(&self.device, self.line)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDaq;

    #[test]
    fn test_line_writes_reach_driver() {
        let sim = SimDaq::usb6000("Dev1");
        let daq: SharedDaq = Rc::new(RefCell::new(sim.clone()));
        let mut line = DaqLine::new(daq, "Dev1", DaqPin::I2cScl);

        line.set_high().unwrap();
        assert_eq!(sim.digital_level("port0/line0"), Some(true));
        line.set_low().unwrap();
        assert_eq!(sim.digital_level("port0/line0"), Some(false));
    }

    #[test]
    fn test_input_line_reads_driver() {
        let sim = SimDaq::usb6000("Dev1");
        sim.set_digital_input("port0/line2", true);
        let daq: SharedDaq = Rc::new(RefCell::new(sim));
        let mut line = DaqLine::new(daq, "Dev1", DaqPin::I2cSdaIn);

        assert!(line.is_high().unwrap());
        assert!(!line.is_low().unwrap());
    }
}
