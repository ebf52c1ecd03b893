//! Simulated bench collaborators.
//!
//! Used by the tests, by dry runs and by the demo. Every simulator is a cheap
//! handle over shared state: keep a clone to inspect what the bench did after
//! handing the other one over.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::{DaqPin, Divider, KiloOhms, Relay};
use crate::dut::mac::MacAddress;
use crate::dut::{DutConnector, DutLink, LinkSettings};
use crate::error::{HardwareError, LinkError};
use crate::hardware::mcp23017::{register, DEFAULT_ADDRESS};
use crate::hardware::{Daq, DeviceInfo, TaskKind, DAQ_PRODUCT_TYPE};
use crate::operator::Prompt;
use crate::printer::{Label, LabelPrinter};
use crate::process::{ProcessExit, ProcessRunner};

/// Rail voltage the simulated bench supplies by default.
pub const NOMINAL_RAIL_VOLTS: f64 = 24.0;

/// Transcript of a board whose self-test passes.
pub const PASSING_TRANSCRIPT: &str =
    "TEST EN COURS\nTEST RS485 OK\nTEST ETH OK\nTEST INPUTS OK\nTEST OUTPUTS OK\nREADY";

// ---------------------------------------------------------------------------
// DAQ
// ---------------------------------------------------------------------------

/// MCP23017 listening on the SCL / SDA lines.
///
/// Decodes START, STOP and data bits from the line levels, acknowledges its
/// own address and applies register writes.
#[derive(Debug)]
struct ExpanderSim {
    scl: bool,
    sda: bool,
    in_frame: bool,
    bit_index: u8,
    current: u8,
    bytes: Vec<u8>,
    ack: bool,
    pull_low: bool,
    registers: [u8; 0x16],
}

impl ExpanderSim {
    fn new() -> Self {
        let mut registers = [0u8; 0x16];
        registers[usize::from(register::IODIRA)] = 0xFF;
        registers[usize::from(register::IODIRB)] = 0xFF;
        Self {
            scl: true,
            sda: true,
            in_frame: false,
            bit_index: 0,
            current: 0,
            bytes: Vec::new(),
            ack: false,
            pull_low: false,
            registers,
        }
    }

    fn drive(&mut self, scl: bool, sda: bool) {
        let (was_scl, was_sda) = (self.scl, self.sda);
        self.scl = scl;
        self.sda = sda;

        if was_scl && scl && was_sda != sda {
            if sda {
                self.stop();
            } else {
                self.start();
            }
            return;
        }
        if !self.in_frame {
            return;
        }
        if !was_scl && scl {
            self.clock_rise();
        } else if was_scl && !scl {
            self.clock_fall();
        }
    }

    fn start(&mut self) {
        if self.in_frame {
            self.commit();
        }
        self.in_frame = true;
        self.bytes.clear();
        self.bit_index = 0;
        self.current = 0;
        self.pull_low = false;
    }

    fn stop(&mut self) {
        if self.in_frame {
            self.commit();
        }
        self.in_frame = false;
        self.bit_index = 0;
        self.pull_low = false;
    }

    fn clock_rise(&mut self) {
        if self.bit_index < 8 {
            self.current = (self.current << 1) | u8::from(self.sda);
            self.bit_index += 1;
            if self.bit_index == 8 {
                let address = self.bytes.first().copied().unwrap_or(self.current);
                self.ack = address >> 1 == DEFAULT_ADDRESS;
                self.bytes.push(self.current);
            }
        } else {
            // ninth clock: acknowledge slot
            self.bit_index = 9;
        }
    }

    fn clock_fall(&mut self) {
        match self.bit_index {
            8 => self.pull_low = self.ack,
            9 => {
                self.pull_low = false;
                self.bit_index = 0;
                self.current = 0;
            }
            _ => {}
        }
    }

    fn commit(&mut self) {
        if let [address, reg, data @ ..] = self.bytes.as_slice() {
            if *address >> 1 != DEFAULT_ADDRESS || *address & 1 != 0 {
                return;
            }
            for (offset, value) in data.iter().enumerate() {
                if let Some(slot) = self.registers.get_mut(usize::from(*reg) + offset) {
                    *slot = *value;
                }
            }
        }
    }

    /// Level seen on the SDA input line.
    fn sda_level(&self) -> bool {
        self.sda && !self.pull_low
    }
}

#[derive(Debug)]
struct DaqState {
    devices: Vec<(String, DeviceInfo)>,
    managed: BTreeSet<String>,
    tasks: Vec<(String, String, TaskKind)>,
    outputs: BTreeMap<String, bool>,
    inputs: BTreeMap<String, bool>,
    analog: BTreeMap<String, f64>,
    close_count: usize,
    expander: ExpanderSim,
}

/// Simulated DAQ driver with an MCP23017 relay board on its I2C lines.
#[derive(Debug, Clone)]
pub struct SimDaq {
    state: Rc<RefCell<DaqState>>,
}

impl Default for SimDaq {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDaq {
    /// Driver that sees no device.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(DaqState {
                devices: Vec::new(),
                managed: BTreeSet::new(),
                tasks: Vec::new(),
                outputs: BTreeMap::new(),
                inputs: BTreeMap::new(),
                analog: BTreeMap::new(),
                close_count: 0,
                expander: ExpanderSim::new(),
            })),
        }
    }

    /// One USB-6000 with the input rails at their nominal voltage.
    pub fn usb6000(name: &str) -> Self {
        let sim = Self::new().with_device(name, DAQ_PRODUCT_TYPE);
        let divider = Divider::new(KiloOhms(12.0), KiloOhms(5.6));
        for pin in [DaqPin::MeasureIve1, DaqPin::MeasureIve2, DaqPin::MeasureIvf] {
            sim.set_analog(pin.line(), NOMINAL_RAIL_VOLTS * divider.ratio());
        }
        sim.set_analog(DaqPin::MeasureAt.line(), 3.3);
        sim
    }

    /// Add a device of another model.
    pub fn with_device(self, name: &str, product_type: &str) -> Self {
        let info = DeviceInfo {
            product_type: product_type.to_string(),
            serial_number: format!("SIM-{}", name),
            calibration_date: Some("2026-01-15".into()),
        };
        self.state.borrow_mut().devices.push((name.to_string(), info));
        self
    }

    /// Voltage seen on an analog line.
    pub fn set_analog(&self, line: &str, volts: f64) {
        self.state.borrow_mut().analog.insert(line.to_string(), volts);
    }

    /// Level of a digital input line.
    pub fn set_digital_input(&self, line: &str, high: bool) {
        self.state.borrow_mut().inputs.insert(line.to_string(), high);
    }

    /// Last level driven on a digital output line.
    pub fn digital_level(&self, line: &str) -> Option<bool> {
        self.state.borrow().outputs.get(line).copied()
    }

    /// Open tasks as (line, kind).
    pub fn tasks(&self) -> Vec<(String, TaskKind)> {
        self.state
            .borrow()
            .tasks
            .iter()
            .map(|(_, line, kind)| (line.clone(), *kind))
            .collect()
    }

    /// Devices currently managed.
    pub fn managed_devices(&self) -> Vec<String> {
        self.state.borrow().managed.iter().cloned().collect()
    }

    /// How many times every task was closed.
    pub fn close_count(&self) -> usize {
        self.state.borrow().close_count
    }

    /// Port B output latch of the relay expander.
    pub fn relay_latch(&self) -> u8 {
        self.state.borrow().expander.registers[usize::from(register::OLATB)]
    }

    /// Port B direction register of the relay expander.
    pub fn relay_direction(&self) -> u8 {
        self.state.borrow().expander.registers[usize::from(register::IODIRB)]
    }

    /// Whether a relay is energised.
    pub fn relay_on(&self, relay: Relay) -> bool {
        self.relay_latch() & (1 << relay.pin().bit()) != 0
    }
}

impl DaqState {
    fn known(&self, device: &str) -> Result<&DeviceInfo, HardwareError> {
        self.devices
            .iter()
            .find(|(name, _)| name == device)
            .map(|(_, info)| info)
            .ok_or_else(|| HardwareError::Daq(format!("unknown device {}", device)))
    }
}

impl Daq for SimDaq {
    fn list_devices(&mut self) -> Result<Vec<String>, HardwareError> {
        Ok(self
            .state
            .borrow()
            .devices
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn add_device(&mut self, device: &str) -> Result<(), HardwareError> {
        let mut state = self.state.borrow_mut();
        state.known(device)?;
        state.managed.insert(device.to_string());
        Ok(())
    }

    fn remove_device(&mut self, device: &str) {
        self.state.borrow_mut().managed.remove(device);
    }

    fn device_info(&mut self, device: &str) -> Result<DeviceInfo, HardwareError> {
        let state = self.state.borrow();
        if !state.managed.contains(device) {
            return Err(HardwareError::Daq(format!("device {} is not managed", device)));
        }
        state.known(device).cloned()
    }

    fn create_task(
        &mut self,
        device: &str,
        line: &str,
        kind: TaskKind,
    ) -> Result<(), HardwareError> {
        let mut state = self.state.borrow_mut();
        state.known(device)?;
        state.tasks.push((device.to_string(), line.to_string(), kind));
        Ok(())
    }

    fn write_digital(&mut self, device: &str, line: &str, high: bool) -> Result<(), HardwareError> {
        let mut state = self.state.borrow_mut();
        state.known(device)?;
        state.outputs.insert(line.to_string(), high);

        if line == DaqPin::I2cScl.line() || line == DaqPin::I2cSdaOut.line() {
            let scl = state.outputs.get(DaqPin::I2cScl.line()).copied().unwrap_or(true);
            let sda = state.outputs.get(DaqPin::I2cSdaOut.line()).copied().unwrap_or(true);
            state.expander.drive(scl, sda);
        }
        Ok(())
    }

    fn read_digital(&mut self, device: &str, line: &str) -> Result<bool, HardwareError> {
        let state = self.state.borrow();
        state.known(device)?;
        let forced = state.inputs.get(line).copied();
        if line == DaqPin::I2cSdaIn.line() {
            let bus = state.expander.sda_level();
            return Ok(forced.map_or(bus, |level| level && !state.expander.pull_low));
        }
        Ok(forced.unwrap_or(false))
    }

    fn read_analog(&mut self, device: &str, line: &str) -> Result<f64, HardwareError> {
        let state = self.state.borrow();
        state.known(device)?;
        Ok(state.analog.get(line).copied().unwrap_or(0.0))
    }

    fn close_all(&mut self) {
        let mut state = self.state.borrow_mut();
        state.tasks.clear();
        state.close_count += 1;
    }
}

// ---------------------------------------------------------------------------
// Board under test
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BoardState {
    transcripts: VecDeque<String>,
    mac: Option<MacAddress>,
    mac_write_reply: Option<String>,
    fail_open: bool,
    commands: Vec<String>,
    opened_ports: Vec<String>,
    close_count: usize,
}

/// Simulated board console.
///
/// Answers `TEST` with the queued transcripts (a passing one when the queue
/// is empty), `TEST MAC` with the stored address and `TEST MAC=...` by
/// storing it.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    state: Rc<RefCell<BoardState>>,
}

impl SimBoard {
    /// Blank board whose self-test passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector opening links to this board.
    pub fn connector(&self) -> SimConnector {
        SimConnector {
            board: self.clone(),
        }
    }

    /// Answer of the next `TEST` command.
    pub fn push_transcript(&self, transcript: &str) {
        self.state
            .borrow_mut()
            .transcripts
            .push_back(transcript.to_string());
    }

    /// Store an address as if written at an earlier run.
    pub fn set_mac(&self, mac: MacAddress) {
        self.state.borrow_mut().mac = Some(mac);
    }

    /// Address currently stored.
    pub fn mac(&self) -> Option<MacAddress> {
        self.state.borrow().mac
    }

    /// Answer `ERROR` to every MAC write.
    pub fn reject_mac_writes(&self) {
        self.refuse_mac_writes_with("ERROR");
    }

    /// Answer every MAC write with `reply` and keep the stored address.
    pub fn refuse_mac_writes_with(&self, reply: &str) {
        self.state.borrow_mut().mac_write_reply = Some(reply.to_string());
    }

    /// Make opening the port fail.
    pub fn fail_open(&self) {
        self.state.borrow_mut().fail_open = true;
    }

    /// Every command received, as sent.
    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    /// Ports the bench opened.
    pub fn opened_ports(&self) -> Vec<String> {
        self.state.borrow().opened_ports.clone()
    }

    /// How many links were closed.
    pub fn close_count(&self) -> usize {
        self.state.borrow().close_count
    }

    fn answer(&self, command: &str) -> String {
        let mut state = self.state.borrow_mut();
        state.commands.push(command.to_string());
        let command = command.trim();

        if command == "TEST" {
            return state
                .transcripts
                .pop_front()
                .unwrap_or_else(|| PASSING_TRANSCRIPT.to_string());
        }
        if command == "TEST MAC" {
            return match state.mac {
                Some(mac) => format!("MAC={}", mac),
                None => "MAC NOT SET".to_string(),
            };
        }
        if let Some(text) = command.strip_prefix("TEST MAC=") {
            if let Some(reply) = &state.mac_write_reply {
                return reply.clone();
            }
            return match text.parse::<MacAddress>() {
                Ok(mac) => {
                    state.mac = Some(mac);
                    "OK".to_string()
                }
                Err(_) => "ERROR".to_string(),
            };
        }
        "UNKNOWN COMMAND".to_string()
    }
}

/// Opens [`SimLink`]s to a [`SimBoard`].
#[derive(Debug, Clone)]
pub struct SimConnector {
    board: SimBoard,
}

impl DutConnector for SimConnector {
    fn open(&mut self, port: &str, _settings: &LinkSettings) -> Result<Box<dyn DutLink>, LinkError> {
        let mut state = self.board.state.borrow_mut();
        if state.fail_open {
            return Err(LinkError::Open {
                port: port.to_string(),
                reason: "port does not exist".into(),
            });
        }
        state.opened_ports.push(port.to_string());
        Ok(Box::new(SimLink {
            board: self.board.clone(),
            connected: true,
        }))
    }
}

/// Open link to a [`SimBoard`].
#[derive(Debug)]
pub struct SimLink {
    board: SimBoard,
    connected: bool,
}

impl DutLink for SimLink {
    fn send_command(
        &mut self,
        command: &str,
        read_until: Option<&str>,
        _timeout: Duration,
    ) -> Result<String, LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        let answer = self.board.answer(command);
        if let Some(terminator) = read_until {
            if !answer.contains(terminator) {
                return Err(LinkError::Timeout {
                    expected: terminator.to_string(),
                });
            }
        }
        Ok(answer.trim().to_string())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) -> Result<(), LinkError> {
        if self.connected {
            self.connected = false;
            self.board.state.borrow_mut().close_count += 1;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operator, printer, processes
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PromptState {
    answers: VecDeque<Option<String>>,
    asked: Vec<String>,
}

/// Operator answering from a script.
///
/// Once the script is exhausted every prompt is answered with an empty line.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    state: Rc<RefCell<PromptState>>,
}

impl ScriptedPrompt {
    /// Operator who presses Enter at every prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a typed answer.
    pub fn push_answer(&self, answer: &str) {
        self.state
            .borrow_mut()
            .answers
            .push_back(Some(answer.to_string()));
    }

    /// Queue a cancel.
    pub fn push_cancel(&self) {
        self.state.borrow_mut().answers.push_back(None);
    }

    /// Titles of every prompt shown, in order.
    pub fn asked(&self) -> Vec<String> {
        self.state.borrow().asked.clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn request_input(&mut self, title: &str, _message: &str) -> Option<String> {
        let mut state = self.state.borrow_mut();
        state.asked.push(title.to_string());
        state.answers.pop_front().unwrap_or_else(|| Some(String::new()))
    }
}

#[derive(Debug, Default)]
struct PrinterState {
    labels: Vec<Label>,
    failure: Option<String>,
}

/// Printer that keeps the labels.
#[derive(Debug, Clone, Default)]
pub struct RecordingPrinter {
    state: Rc<RefCell<PrinterState>>,
}

impl RecordingPrinter {
    /// Working printer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every print fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.state.borrow_mut().failure = Some(message.to_string());
    }

    /// Labels printed so far.
    pub fn labels(&self) -> Vec<Label> {
        self.state.borrow().labels.clone()
    }
}

impl LabelPrinter for RecordingPrinter {
    fn print_label(&mut self, label: &Label) -> Result<(), HardwareError> {
        let mut state = self.state.borrow_mut();
        if let Some(message) = &state.failure {
            return Err(HardwareError::Printer(message.clone()));
        }
        state.labels.push(label.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    exits: VecDeque<Result<ProcessExit, String>>,
    calls: Vec<(PathBuf, Vec<String>)>,
}

/// Process runner answering from a script; unscripted runs exit with 0.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    state: Rc<RefCell<RunnerState>>,
}

impl ScriptedRunner {
    /// Runner where everything succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the exit of the next run.
    pub fn push_exit(&self, exit: ProcessExit) {
        self.state.borrow_mut().exits.push_back(Ok(exit));
    }

    /// Queue a spawn failure for the next run.
    pub fn push_error(&self, message: &str) {
        self.state
            .borrow_mut()
            .exits
            .push_back(Err(message.to_string()));
    }

    /// Every run as (program, arguments).
    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.state.borrow().calls.clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(
        &mut self,
        program: &Path,
        args: &[String],
        _timeout: Option<Duration>,
    ) -> io::Result<ProcessExit> {
        let mut state = self.state.borrow_mut();
        state.calls.push((program.to_path_buf(), args.to_vec()));
        match state.exits.pop_front() {
            Some(Ok(exit)) => Ok(exit),
            Some(Err(message)) => Err(io::Error::new(io::ErrorKind::NotFound, message)),
            None => Ok(ProcessExit::exited(0)),
        }
    }
}

// ---------------------------------------------------------------------------
// Database content
// ---------------------------------------------------------------------------

/// Reference rows of a bench built for product list 6, operator GERARDIN,
/// with `config_json` stored as the `config_IV90115` parameter file.
///
/// Seed for [`MemoryDatabase::from_json`](crate::db::MemoryDatabase::from_json).
pub fn reference_data(config_json: &Value) -> Value {
    json!({
        "operator": [
            { "id": 1, "name": "GERARDIN", "first_name": "Thomas" }
        ],
        "product_list": [
            {
                "id": 6,
                "name": "UIB 3 en 1 8E8S RS485 Ethernet 24VDC",
                "bench_composition_id": 3,
                "parameters_group_id": 4
            }
        ],
        "bench_composition": [
            { "id": 1, "bench_composition_id": 3, "external_device_id": 10 }
        ],
        "external_device": [
            { "id": 10, "name": "NI USB-6000", "serial_number": "SIM-Dev1" }
        ],
        "script": [
            { "id": 1, "product_list_id": 6, "name": "bench.py", "valid": 1, "file": "<blob>" },
            { "id": 2, "product_list_id": 6, "name": "old_bench.py", "valid": 0, "file": "<blob>" }
        ],
        "parameters_group": [
            { "id": 1, "parameters_group_id": 4, "parameters_id": 20 }
        ],
        "parameters": [
            { "id": 20, "name": "config_IV90115", "file": config_json.to_string() }
        ]
    })
}
