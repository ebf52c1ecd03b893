//! Bench context shared by every step of a run.

use std::path::PathBuf;

use embedded_hal::delay::DelayNs;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{validate_settings, BenchSettings, ConfigItems, DaqPin, Relay};
use crate::db::{record, row, Database, ValueRecord};
use crate::dut::{DutConnector, DutLink};
use crate::error::{DatabaseError, Error, HardwareError, LinkError, RecordError, Result};
use crate::hardware::{RelayControl, SharedDaq, StdDelay};
use crate::operator::{ConsolePrompt, Prompt};
use crate::printer::LabelPrinter;
use crate::process::{ProcessRunner, SystemRunner};

/// File name of the materialised test configuration.
pub const CONFIG_JSON: &str = "config.json";

/// Devices, connections and run state shared by the steps.
///
/// Steps read and fill these fields in sequence: initialisation sets the
/// database anchors, the DAQ device and the relays; `init_dut` opens the
/// serial link; teardown releases everything. Dropping the bench releases
/// whatever is still held.
pub struct Bench {
    /// Local bench settings.
    pub settings: BenchSettings,
    /// Database connection.
    pub db: Option<Box<dyn Database>>,
    /// Row anchoring every value of the current run.
    pub device_under_test_id: Option<i64>,
    /// Paths and ports from config.json.
    pub items: ConfigItems,
    /// No run completed initialisation yet in this session.
    pub first_test: bool,
    /// Application firmware chosen by the operator.
    pub firmware_path: Option<PathBuf>,
    /// DAQ driver supplied by the host.
    pub daq: Option<SharedDaq>,
    /// DAQ device selected by initialisation.
    pub daq_device: Option<String>,
    /// Relay bank brought up by initialisation.
    pub relays: Option<Box<dyn RelayControl>>,
    /// Serial link opened by `init_dut`.
    pub dut: Option<Box<dyn DutLink>>,
    /// Label printer supplied by the host.
    pub printer: Option<Box<dyn LabelPrinter>>,
    /// Operator input.
    pub prompt: Box<dyn Prompt>,
    /// Opens the serial link.
    pub connector: Box<dyn DutConnector>,
    /// Runs the programmer CLI and `ping`.
    pub processes: Box<dyn ProcessRunner>,
    /// Settle delays.
    pub delay: Box<dyn DelayNs>,
}

impl Bench {
    /// Create a builder.
    pub fn builder() -> BenchBuilder {
        BenchBuilder::new()
    }

    /// Database connection, or an error when there is none.
    pub fn database(&mut self) -> Result<&mut (dyn Database + 'static)> {
        self.db
            .as_deref_mut()
            .ok_or(Error::Database(DatabaseError::NotConnected))
    }

    /// Create the `step_name` row every step starts with.
    pub fn begin_step(&mut self, step_name: &str) -> Result<i64> {
        let data = row(json!({
            "device_under_test_id": self.device_under_test_id,
            "step_name": step_name,
        }));
        let id = self.database()?.create("step_name", data)?;
        debug!(step = step_name, step_name_id = id, "step started");
        Ok(id)
    }

    /// Record a value of the current run.
    ///
    /// # Errors
    ///
    /// Fails without writing when there is no database or no
    /// device-under-test row yet.
    pub fn save_value(&mut self, value: ValueRecord) -> Result<i64> {
        let dut = self.device_under_test_id;
        let db = self
            .db
            .as_deref_mut()
            .ok_or(Error::Record(RecordError::NoDatabase))?;
        record::save_value(db, dut, &value)
    }

    /// Flag a recorded measurement as within limits.
    pub fn mark_valid(&mut self, value_id: i64) -> Result<()> {
        self.database()?
            .update_by_id("skvp_float", value_id, row(json!({ "valid": 1 })))?;
        Ok(())
    }

    /// Switch one relay.
    pub fn set_relay(&mut self, relay: Relay, on: bool) -> Result<()> {
        self.relays
            .as_deref_mut()
            .ok_or(Error::Hardware(HardwareError::RelaysNotInitialized))?
            .set(relay, on)?;
        Ok(())
    }

    /// Driver and device selected by initialisation.
    pub fn daq_handle(&self) -> Result<(SharedDaq, String)> {
        match (&self.daq, &self.daq_device) {
            (Some(daq), Some(device)) => Ok((daq.clone(), device.clone())),
            _ => Err(Error::Hardware(HardwareError::DaqNotInitialized)),
        }
    }

    /// Sample an analog input, in volts at the DAQ pin.
    pub fn read_analog(&mut self, pin: DaqPin) -> Result<f64> {
        let (daq, device) = self.daq_handle()?;
        let volts = daq.borrow_mut().read_analog(&device, pin.line())?;
        Ok(volts)
    }

    /// Open serial link.
    pub fn dut_link(&mut self) -> Result<&mut (dyn DutLink + 'static)> {
        match self.dut.as_deref_mut() {
            Some(link) if link.is_connected() => Ok(link),
            _ => Err(Error::Link(LinkError::NotConnected)),
        }
    }

    /// Serial port of the board, honouring the debug override.
    pub fn dut_port(&self) -> String {
        if self.settings.is_debug() {
            self.settings.debug.port.clone()
        } else {
            self.items.dut.port.clone()
        }
    }

    /// Where config.json is materialised.
    pub fn config_json_path(&self) -> PathBuf {
        self.settings.station.work_dir.join(CONFIG_JSON)
    }

    /// Ask the operator; a cancel becomes [`Error::Cancelled`].
    pub fn ask(&mut self, title: &str, message: &str) -> Result<String> {
        self.prompt
            .request_input(title, message)
            .ok_or_else(|| Error::Cancelled(title.to_string()))
    }

    /// Block for `ms` milliseconds.
    pub fn wait_ms(&mut self, ms: u32) {
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    /// Release every resource still held.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn cleanup(&mut self) {
        if let Some(mut db) = self.db.take() {
            db.disconnect();
        }
        if let Some(mut relays) = self.relays.take() {
            if let Err(e) = relays.all_off() {
                warn!(error = %e, "could not release relays");
            }
        }
        if let (Some(daq), Some(_)) = (&self.daq, self.daq_device.take()) {
            daq.borrow_mut().close_all();
        }
        if let Some(mut link) = self.dut.take() {
            if link.is_connected() {
                if let Err(e) = link.close() {
                    warn!(error = %e, "could not close serial port");
                }
            }
        }
        self.device_under_test_id = None;
    }
}

impl Drop for Bench {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Builder for [`Bench`].
#[derive(Default)]
pub struct BenchBuilder {
    settings: Option<BenchSettings>,
    db: Option<Box<dyn Database>>,
    daq: Option<SharedDaq>,
    printer: Option<Box<dyn LabelPrinter>>,
    prompt: Option<Box<dyn Prompt>>,
    connector: Option<Box<dyn DutConnector>>,
    processes: Option<Box<dyn ProcessRunner>>,
    delay: Option<Box<dyn DelayNs>>,
}

impl BenchBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bench settings.
    pub fn settings(mut self, settings: BenchSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set the database connection.
    pub fn database(mut self, db: impl Database + 'static) -> Self {
        self.db = Some(Box::new(db));
        self
    }

    /// Set the DAQ driver.
    pub fn daq(mut self, daq: SharedDaq) -> Self {
        self.daq = Some(daq);
        self
    }

    /// Set the label printer.
    pub fn printer(mut self, printer: impl LabelPrinter + 'static) -> Self {
        self.printer = Some(Box::new(printer));
        self
    }

    /// Set the operator prompt (defaults to the terminal).
    pub fn prompt(mut self, prompt: impl Prompt + 'static) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    /// Set the serial connector (defaults to real serial ports).
    pub fn connector(mut self, connector: impl DutConnector + 'static) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    /// Set the process runner (defaults to the host).
    pub fn processes(mut self, processes: impl ProcessRunner + 'static) -> Self {
        self.processes = Some(Box::new(processes));
        self
    }

    /// Set the delay provider (defaults to sleeping).
    pub fn delay(mut self, delay: impl DelayNs + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    /// Build the bench.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or no serial connector is
    /// available.
    pub fn build(self) -> Result<Bench> {
        let settings = self.settings.unwrap_or_default();
        validate_settings(&settings)?;

        let connector = match self.connector {
            Some(connector) => connector,
            None => default_connector()?,
        };

        Ok(Bench {
            settings,
            db: self.db,
            device_under_test_id: None,
            items: ConfigItems::default(),
            first_test: true,
            firmware_path: None,
            daq: self.daq,
            daq_device: None,
            relays: None,
            dut: None,
            printer: self.printer,
            prompt: self
                .prompt
                .unwrap_or_else(|| Box::new(ConsolePrompt::stdio())),
            connector,
            processes: self.processes.unwrap_or_else(|| Box::new(SystemRunner)),
            delay: self.delay.unwrap_or_else(|| Box::new(StdDelay)),
        })
    }
}

#[cfg(feature = "serial")]
fn default_connector() -> Result<Box<dyn DutConnector>> {
    Ok(Box::new(crate::dut::SerialConnector))
}

#[cfg(not(feature = "serial"))]
fn default_connector() -> Result<Box<dyn DutConnector>> {
    Err(Error::Config(crate::error::ConfigError::MissingComponent(
        "serial connector",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatabase;
    use crate::sim::{ScriptedPrompt, SimBoard, SimDaq};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn bench(db: Option<MemoryDatabase>) -> Bench {
        let mut builder = Bench::builder()
            .prompt(ScriptedPrompt::new())
            .connector(SimBoard::new().connector())
            .delay(NoopDelay::new());
        if let Some(db) = db {
            builder = builder.database(db);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_save_value_needs_database() {
        let mut bench = bench(None);
        bench.device_under_test_id = Some(1);

        let result = bench.save_value(ValueRecord::new(1, "VERSION", "V1.0.0"));
        assert_eq!(result, Err(Error::Record(RecordError::NoDatabase)));
    }

    #[test]
    fn test_save_value_needs_device_under_test() {
        let db = MemoryDatabase::new();
        let mut bench = bench(Some(db.clone()));

        let result = bench.save_value(ValueRecord::new(1, "VERSION", "V1.0.0"));

        assert_eq!(result, Err(Error::Record(RecordError::NoDeviceUnderTest)));
        assert!(db.rows("skvp_char").is_empty());
    }

    #[test]
    fn test_mark_valid() {
        let db = MemoryDatabase::new();
        let mut bench = bench(Some(db.clone()));
        bench.device_under_test_id = Some(1);

        let id = bench
            .save_value(ValueRecord::new(1, "IVE1_V", 24.0).limits(23.5, 25.5))
            .unwrap();
        bench.mark_valid(id).unwrap();

        assert_eq!(db.rows("skvp_float")[0]["valid"], json!(1));
    }

    #[test]
    fn test_dut_port_debug_override() {
        let mut bench = bench(None);
        bench.items.dut.port = "COM3".into();
        assert_eq!(bench.dut_port(), "COM11");

        bench.settings.station.git_hash = "a1b2c3d".into();
        assert_eq!(bench.dut_port(), "COM3");
    }

    #[test]
    fn test_missing_handles_are_errors() {
        let mut bench = bench(None);
        assert_eq!(
            bench.set_relay(Relay::En24V, true),
            Err(Error::Hardware(HardwareError::RelaysNotInitialized))
        );
        assert_eq!(
            bench.read_analog(DaqPin::MeasureIve1),
            Err(Error::Hardware(HardwareError::DaqNotInitialized))
        );
        assert!(matches!(
            bench.dut_link(),
            Err(Error::Link(LinkError::NotConnected))
        ));
    }

    #[test]
    fn test_cancelled_prompt() {
        let prompt = ScriptedPrompt::new();
        prompt.push_cancel();
        let mut bench = Bench::builder()
            .prompt(prompt)
            .connector(SimBoard::new().connector())
            .build()
            .unwrap();

        assert_eq!(
            bench.ask("Soft", "Path?"),
            Err(Error::Cancelled("Soft".into()))
        );
    }

    #[test]
    fn test_drop_releases_resources() {
        let db = MemoryDatabase::new();
        let sim = SimDaq::usb6000("Dev1");
        {
            let mut bench = bench(Some(db.clone()));
            let daq: SharedDaq = Rc::new(RefCell::new(sim.clone()));
            bench.daq = Some(daq);
            bench.daq_device = Some("Dev1".into());
        }
        assert!(!db.is_connected());
        assert_eq!(sim.close_count(), 1);
    }
}
