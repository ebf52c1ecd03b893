//! First step: database checks, run anchoring and bench bring-up.

use std::fs;

use chrono::Local;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::bench::Bench;
use crate::config::{ConfigItems, DaqPin, Relay};
use crate::db::{column_i64, row, Row, ValueRecord};
use crate::error::{ConfigError, DatabaseError, Error, HardwareError, Result};
use crate::hardware::{daq_relay_bank, SharedDaq, TaskKind, DAQ_PRODUCT_TYPE};
use crate::operator::Color;

use super::{guarded, Step, StepContext, StepOutcome, StepStatus};

/// Checks the reference data, creates the device-under-test row and brings
/// up the DAQ and the relay bank.
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialisation;

/// Reference data the run is based on.
struct Snapshot {
    operator_id: i64,
    product_id: i64,
    config_id: i64,
    config_file: Value,
    data: Value,
}

impl Step for Initialisation {
    fn name(&self) -> &'static str {
        "initialisation"
    }

    fn info(&self) -> &'static str {
        "Creates device_under_test and brings up the DAQ and the relays."
    }

    fn run(&self, bench: &mut Bench, ctx: &mut StepContext<'_>) -> StepOutcome {
        guarded(self.name(), ctx, |ctx, report| {
            ctx.log(
                format!("show_all_logs = {}", bench.settings.run.show_all_logs),
                Color::Blue,
            );
            let snapshot = check_database(bench, ctx)?;
            materialise_config(bench, &snapshot.config_file)?;
            anchor_run(bench, ctx, self.name(), snapshot)?;

            ctx.progress(30);
            ctx.log("Initialising the DAQ...", Color::Cyan);
            let summary = connect_daq(bench)?;
            ctx.log(summary, Color::Blue);

            ctx.progress(75);
            ctx.log("Initialising the MCP23017...", Color::Cyan);
            init_relays(bench)?;
            ctx.log(
                format!(
                    "MCP23017: SDA out on {}, SDA in on {}, SCL on {}.",
                    DaqPin::I2cSdaOut.line(),
                    DaqPin::I2cSdaIn.line(),
                    DaqPin::I2cScl.line()
                ),
                Color::Blue,
            );

            if bench.first_test {
                choose_firmware(bench, ctx)?;
                bench.first_test = false;
            }

            ctx.progress(100);
            report.push("Initialisation OK");
            Ok(StepStatus::Success)
        })
    }
}

fn not_found(what: &str) -> Error {
    Error::Database(DatabaseError::NotFound(what.to_string()))
}

fn check_database(bench: &mut Bench, ctx: &mut StepContext<'_>) -> Result<Snapshot> {
    let operator = bench.settings.run.operator.clone();
    let last_name = match operator.split_whitespace().nth(1) {
        Some(name) => name.to_string(),
        None => return Err(ConfigError::InvalidOperatorName(operator).into()),
    };

    let given = bench.settings.run.product_list_id.trim().to_string();
    let expected = bench.settings.station.product_list_id_default.clone();
    if given != expected {
        return Err(ConfigError::ProductMismatch { given, expected }.into());
    }
    let product_id: i64 = given.parse().map_err(|_| ConfigError::ProductMismatch {
        given: given.clone(),
        expected: expected.clone(),
    })?;
    let config_json_name = bench.settings.station.config_json_name.clone();

    let db = bench.database()?;

    let operator_row = db
        .get_by_column("operator", "name", &json!(last_name))?
        .into_iter()
        .next()
        .ok_or_else(|| not_found(&format!("operator {}", last_name)))?;
    let operator_id = column_i64(&operator_row, "id").ok_or_else(|| invalid("operator", "id"))?;

    let product = db
        .get_by_id("product_list", product_id)?
        .ok_or_else(|| not_found("product"))?;

    let bench_composition = match product.get("bench_composition_id") {
        Some(id) => db.get_by_column("bench_composition", "bench_composition_id", id)?,
        None => Vec::new(),
    };
    if bench_composition.is_empty() {
        return Err(not_found("bench composition"));
    }

    let mut external_devices = Vec::new();
    for part in &bench_composition {
        if let Some(id) = column_i64(part, "external_device_id") {
            if let Some(device) = db.get_by_id("external_device", id)? {
                external_devices.push(device);
            }
        }
    }
    if external_devices.is_empty() {
        return Err(not_found("external device"));
    }

    let scripts: Vec<Row> = db
        .get_by_column("script", "product_list_id", &json!(product_id))?
        .into_iter()
        .filter(|script| column_i64(script, "valid") != Some(0))
        .map(|mut script| {
            script.remove("file");
            script
        })
        .collect();
    if scripts.is_empty() {
        return Err(not_found("script"));
    }

    let parameters_group = match product.get("parameters_group_id") {
        Some(id) => db.get_by_column("parameters_group", "parameters_group_id", id)?,
        None => Vec::new(),
    };
    if parameters_group.is_empty() {
        return Err(not_found("parameters group"));
    }

    let mut parameters = Vec::new();
    for group in &parameters_group {
        if let Some(id) = column_i64(group, "parameters_id") {
            if let Some(parameter) = db.get_by_id("parameters", id)? {
                parameters.push(parameter);
            }
        }
    }
    if parameters.is_empty() {
        return Err(not_found("parameters"));
    }

    let config_row = parameters
        .iter()
        .find(|p| p.get("name").and_then(Value::as_str) == Some(config_json_name.as_str()))
        .ok_or_else(|| not_found(&format!("config file {}", config_json_name)))?;
    let config_id = column_i64(config_row, "id").ok_or_else(|| invalid("parameters", "id"))?;
    let config_file = config_row.get("file").cloned().unwrap_or(Value::Null);
    ctx.log(
        format!(
            "The config file in use is row id={} of the parameters table",
            config_id
        ),
        Color::Blue,
    );

    let data = json!({
        "operator": operator_row,
        "product_list": product,
        "bench_composition": bench_composition,
        "external_devices": external_devices,
        "script": scripts,
        "parameters_group": parameters_group,
        "parameters": parameters,
    });

    Ok(Snapshot {
        operator_id,
        product_id,
        config_id,
        config_file,
        data,
    })
}

fn invalid(table: &str, column: &str) -> Error {
    Error::Database(DatabaseError::InvalidRow {
        table: table.to_string(),
        reason: format!("missing '{}'", column),
    })
}

/// Write config.json into the work directory and read it back.
///
/// The file is removed again when it cannot be parsed.
fn materialise_config(bench: &mut Bench, file: &Value) -> Result<()> {
    let content = match file {
        Value::String(text) => text.clone().into_bytes(),
        Value::Null => return Err(not_found("config file content")),
        other => other.to_string().into_bytes(),
    };
    let path = bench.config_json_path();

    let loaded = fs::write(&path, &content)
        .map_err(|e| ConfigError::TestConfig(e.to_string()))
        .and_then(|()| fs::read(&path).map_err(|e| ConfigError::TestConfig(e.to_string())))
        .and_then(|bytes| ConfigItems::from_slice(&bytes));

    match loaded {
        Ok(items) => {
            debug!(path = %path.display(), "config.json materialised");
            bench.items = items;
            Ok(())
        }
        Err(e) => {
            if path.exists() {
                let _ = fs::remove_file(&path);
            }
            Err(e.into())
        }
    }
}

fn anchor_run(
    bench: &mut Bench,
    ctx: &mut StepContext<'_>,
    step_name: &str,
    snapshot: Snapshot,
) -> Result<()> {
    let run = &bench.settings.run;
    let dut = row(json!({
        "operator_id": snapshot.operator_id,
        "product_id": snapshot.product_id,
        "sn": run.article,
        "date": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "result": 0,
        "of": run.of,
        "command_number": run.command_number,
        "client": "",
        "failure_label": "",
        "name": bench.settings.station.name,
    }));
    let id = bench.database()?.create("device_under_test", dut)?;
    bench.device_under_test_id = Some(id);
    info!(device_under_test_id = id, "device under test created");
    ctx.log(format!("Device under test created with id {}.", id), Color::Purple);

    let step_id = bench.begin_step(step_name)?;
    let version = bench.settings.station.version.clone();
    let data = serde_json::to_string_pretty(&snapshot.data)
        .map_err(|e| Error::Io(e.to_string()))?;
    bench.save_value(ValueRecord::new(step_id, "VERSION", version))?;
    bench.save_value(ValueRecord::new(step_id, "data_used_for_test", data))?;
    bench.save_value(ValueRecord::new(step_id, "id_fichier_config", snapshot.config_id))?;
    Ok(())
}

/// Select the first USB-6000 and create the tasks of the run.
fn connect_daq(bench: &mut Bench) -> Result<String> {
    let daq: SharedDaq = bench
        .daq
        .clone()
        .ok_or(Error::Hardware(HardwareError::DaqUnavailable))?;
    let mut driver = daq.borrow_mut();

    let devices = driver.list_devices()?;
    if devices.is_empty() {
        return Err(HardwareError::NoDaqDevice.into());
    }

    let mut selected = None;
    for device in devices {
        driver.add_device(&device)?;
        match driver.device_info(&device) {
            Ok(info) if info.product_type == DAQ_PRODUCT_TYPE => {
                selected = Some(device);
                break;
            }
            _ => driver.remove_device(&device),
        }
    }
    let device = selected.ok_or(HardwareError::DaqModelNotFound(DAQ_PRODUCT_TYPE))?;

    driver.close_all();
    let info = driver.device_info(&device)?;

    let tasks = [
        (DaqPin::I2cSdaOut, TaskKind::DigitalOutput),
        (DaqPin::I2cSdaIn, TaskKind::DigitalInput),
        (DaqPin::I2cScl, TaskKind::DigitalOutput),
        (DaqPin::MeasureIve1, TaskKind::AnalogInput),
        (DaqPin::MeasureIve2, TaskKind::AnalogInput),
        (DaqPin::MeasureIvf, TaskKind::AnalogInput),
        (DaqPin::MeasureAt, TaskKind::AnalogInput),
    ];
    for (pin, kind) in tasks {
        driver.create_task(&device, pin.line(), kind)?;
    }
    drop(driver);

    info!(device = %device, serial = %info.serial_number, "DAQ ready");
    let summary = format!(
        "DAQ: port {} ; model {} ; SN {} ; calibration {}",
        device,
        info.product_type,
        info.serial_number,
        info.calibration_date.as_deref().unwrap_or("unknown")
    );
    bench.daq_device = Some(device);
    Ok(summary)
}

fn init_relays(bench: &mut Bench) -> Result<()> {
    let (daq, device) = bench.daq_handle()?;
    let bank = daq_relay_bank(&daq, &device)?;
    bench.relays = Some(Box::new(bank));

    for relay in [
        Relay::EnAutomaticBtl,
        Relay::EnAutomatic24V,
        Relay::EnAutomaticGndInputs,
    ] {
        bench.set_relay(relay, true)?;
    }
    let settle = bench.settings.timings.relay_settle_ms;
    bench.wait_ms(settle);
    Ok(())
}

fn choose_firmware(bench: &mut Bench, ctx: &mut StepContext<'_>) -> Result<()> {
    if bench.settings.is_debug() {
        ctx.log("DEBUG mode: skipping the firmware path input.", Color::Yellow);
        bench.firmware_path = Some(bench.settings.debug.firmware_path.clone());
        return Ok(());
    }
    let path = bench.ask(
        "Application firmware",
        "Enter the path of the application firmware\nEx: \"T:\\SW\\00\\083\\A\\SW00083_A01r_UIB_APP.hex\"",
    )?;
    let path = path.trim();
    if !path.is_empty() {
        bench.firmware_path = Some(path.into());
    }
    Ok(())
}
