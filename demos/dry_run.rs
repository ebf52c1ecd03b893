//! Dry run of the full bench sequence.
//!
//! Runs every step against the simulated bench: in-memory database, DAQ with
//! its relay expander, board console, printer and external processes. The
//! operator answers on the terminal.
//!
//! Run with: `cargo run --example dry_run [bench.toml]`
//!
//! Set `RUST_LOG=debug` (or `show_all_logs = true` under `[run]`) to see the
//! diagnostics.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use bench_sequencer::config::Timings;
use bench_sequencer::sim::{
    reference_data, RecordingPrinter, ScriptedRunner, SimBoard, SimDaq,
};
use bench_sequencer::steps::PROGRAMMER_CLI;
use bench_sequencer::{load_settings, Bench, BenchSettings, Color, MemoryDatabase, Sequence};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = match std::env::args().nth(1) {
        Some(path) => load_settings(path)?,
        None => BenchSettings::default(),
    };

    let level = if settings.run.show_all_logs { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    // Everything the bench touches on disk lives in a scratch directory
    let work = tempfile::tempdir()?;
    let root = work.path();
    let programmer = root.join("STM32CubeProgrammer");
    fs::create_dir_all(&programmer)?;
    fs::write(programmer.join(PROGRAMMER_CLI), b"")?;
    fs::write(root.join("btl.hex"), b":00000001FF")?;
    fs::write(root.join("app.hex"), b":00000001FF")?;
    fs::write(
        root.join("mac.json"),
        serde_json::to_string_pretty(&json!({
            "entries": [
                { "mac_address": "00:80:E1:00:00:01", "product": "", "delivery_date": "", "bl": "" },
                { "mac_address": "00:80:E1:00:00:02", "product": "", "delivery_date": "", "bl": "" }
            ]
        }))?,
    )?;

    let config = json!({
        "STM32CubeProgrammer": { "path": programmer.display().to_string() },
        "MAC_ADRESS_FILE": { "path": root.join("mac.json").display().to_string() },
        "PORT_COM_DUT": { "port": "SIM0" },
        "BTL": { "path": root.join("btl.hex").display().to_string() },
        "MICROCONTROLLER": { "path": root.join("app.hex").display().to_string() },
    });

    settings.station.work_dir = root.to_path_buf();
    settings.debug.port = "SIM0".into();
    settings.debug.firmware_path = root.join("app.hex");
    settings.timings = Timings::none();
    if settings.run.operator.is_empty() {
        settings.run.operator = "Thomas GERARDIN".into();
    }
    if settings.run.product_list_id.is_empty() {
        settings.run.product_list_id = settings.station.product_list_id_default.clone();
    }

    let db = MemoryDatabase::from_json(&reference_data(&config))?;
    let printer = RecordingPrinter::new();

    let mut bench = Bench::builder()
        .settings(settings)
        .database(db.clone())
        .daq(Rc::new(RefCell::new(SimDaq::usb6000("Dev1"))))
        .printer(printer.clone())
        .connector(SimBoard::new().connector())
        .processes(ScriptedRunner::new())
        .build()?;

    let sequence = Sequence::standard();
    println!("Steps: {}", sequence.names().join(" -> "));

    let report = sequence.run(
        &mut bench,
        &mut |message: &str, color: Color| println!("[{:>6}] {}", color, message),
        &mut |percent: u8| tracing::debug!(percent, "progress"),
    );
    drop(bench);

    println!();
    for outcome in report.outcomes.iter().chain(std::iter::once(&report.teardown)) {
        println!(
            "{:<16} {:<8} {}",
            outcome.report.step_name,
            outcome.status,
            outcome.report.infos.join(" | ")
        );
    }
    for label in printer.labels() {
        println!("Label: {}", label.lines.join(" / "));
    }
    println!(
        "Values recorded: {}",
        ["skvp_float", "skvp_char", "skvp_json"]
            .iter()
            .map(|t| db.rows(t).len())
            .sum::<usize>()
    );
    println!("Result: {}", if report.passed() { "PASS" } else { "FAIL" });
    Ok(())
}
