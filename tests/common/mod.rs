//! Simulated bench shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use embedded_hal_mock::eh1::delay::NoopDelay;
use serde_json::{json, Value};
use tempfile::TempDir;

use bench_sequencer::config::Timings;
use bench_sequencer::db::Row;
use bench_sequencer::sim::{
    reference_data, RecordingPrinter, ScriptedPrompt, ScriptedRunner, SimBoard, SimDaq,
};
use bench_sequencer::steps::PROGRAMMER_CLI;
use bench_sequencer::{Bench, BenchSettings, Color, MemoryDatabase, Sequence, SequenceReport};

pub const LEDGER: &str = r#"{
  "entries": [
    { "mac_address": "00:80:E1:00:00:01", "product": "IV90115", "delivery_date": "2026-10-01", "bl": "CMD-1" },
    { "mac_address": "00:80:E1:00:00:02", "product": "", "delivery_date": "", "bl": "" },
    { "mac_address": "00:80:E1:00:00:03", "product": "", "delivery_date": "", "bl": "" }
  ]
}"#;

/// Every simulated device plus a work directory holding the programmer,
/// both firmware images and the MAC ledger.
pub struct Rig {
    pub dir: TempDir,
    pub settings: BenchSettings,
    pub db: MemoryDatabase,
    pub daq: SimDaq,
    pub board: SimBoard,
    pub prompt: ScriptedPrompt,
    pub printer: RecordingPrinter,
    pub runner: ScriptedRunner,
    pub ledger: PathBuf,
    pub log: Rc<RefCell<Vec<(String, Color)>>>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Rig whose config.json is edited before it is stored in the database.
    pub fn with_config(edit: impl FnOnce(&mut Value)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path();

        let programmer = root.join("programmer");
        fs::create_dir(&programmer).expect("programmer dir");
        fs::write(programmer.join(PROGRAMMER_CLI), b"").expect("programmer");
        fs::write(root.join("btl.hex"), b":00000001FF").expect("bootloader");
        fs::write(root.join("app.hex"), b":00000001FF").expect("application");
        let ledger = root.join("mac.json");
        fs::write(&ledger, LEDGER).expect("ledger");

        let mut config = json!({
            "STM32CubeProgrammer": { "path": programmer.display().to_string() },
            "MAC_ADRESS_FILE": { "path": ledger.display().to_string() },
            "PORT_COM_DUT": { "port": "COM7" },
            "BTL": { "path": root.join("btl.hex").display().to_string() },
            "MICROCONTROLLER": { "path": root.join("app.hex").display().to_string() },
        });
        edit(&mut config);

        let mut settings = BenchSettings::default();
        settings.station.git_hash = "a1b2c3d".into();
        settings.station.work_dir = root.to_path_buf();
        settings.run.operator = "Thomas GERARDIN".into();
        settings.run.product_list_id = "6".into();
        settings.run.article = "IV90115".into();
        settings.run.indice = "A".into();
        settings.run.of = "OF-2026-118".into();
        settings.run.command_number = "CMD-42".into();
        settings.timings = Timings::none();
        settings.measurement.settle_ms = 0;

        let db = MemoryDatabase::from_json(&reference_data(&config)).expect("seed");

        Self {
            dir,
            settings,
            db,
            daq: SimDaq::usb6000("Dev1"),
            board: SimBoard::new(),
            prompt: ScriptedPrompt::new(),
            printer: RecordingPrinter::new(),
            runner: ScriptedRunner::new(),
            ledger,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Development build using the debug overrides.
    pub fn debug(mut self) -> Self {
        self.settings.station.git_hash = "DEBUG".into();
        self.settings.debug.port = "COM11".into();
        self.settings.debug.firmware_path = self.dir.path().join("app.hex");
        self
    }

    pub fn bench(&self) -> Bench {
        Bench::builder()
            .settings(self.settings.clone())
            .database(self.db.clone())
            .daq(Rc::new(RefCell::new(self.daq.clone())))
            .printer(self.printer.clone())
            .prompt(self.prompt.clone())
            .connector(self.board.connector())
            .processes(self.runner.clone())
            .delay(NoopDelay::new())
            .build()
            .expect("bench")
    }

    pub fn run(&self) -> SequenceReport {
        let mut bench = self.bench();
        self.run_on(&mut bench, &Sequence::standard())
    }

    pub fn run_on(&self, bench: &mut Bench, sequence: &Sequence) -> SequenceReport {
        let log = self.log.clone();
        let mut sink = move |message: &str, color: Color| {
            log.borrow_mut().push((message.to_string(), color));
        };
        let mut progress = |_: u8| {};
        sequence.run(bench, &mut sink, &mut progress)
    }

    /// Rows of a `skvp_*` table recorded under `key`.
    pub fn values(&self, table: &str, key: &str) -> Vec<Row> {
        self.db
            .rows(table)
            .into_iter()
            .filter(|r| r.get("key") == Some(&json!(key)))
            .collect()
    }

    pub fn device_under_test(&self) -> Option<Row> {
        self.db.rows("device_under_test").into_iter().next()
    }

    pub fn logged(&self, color: Color) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|(_, c)| *c == color)
            .map(|(m, _)| m.clone())
            .collect()
    }
}
