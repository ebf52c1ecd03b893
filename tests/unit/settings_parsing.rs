//! Unit tests for TOML bench settings parsing.

use std::io::Write;

use bench_sequencer::config::{load_settings, parse_settings, Volts};
use bench_sequencer::error::{ConfigError, Error};

/// A complete bench.toml as deployed on the production bench.
const PRODUCTION: &str = r#"
[station]
name = "UIB 3 en 1 8E8S RS485 Ehernet 24VDC"
version = "V1.2.0"
git_hash = "4f2c9e1"
company = "CAPSYS"
product_list_id_default = "6"
config_json_name = "config_IV90115"
work_dir = "C:\\bench\\work"

[run]
operator = "Thomas GERARDIN"
command_number = "CMD-42"
of = "OF-2026-118"
article = "IV90115"
indice = "A"
product_list_id = "6"
show_all_logs = true

[database]
host = "10.0.0.5"
port = 3307
user = "bench"
password = "secret"
database = "capsys_db_bdt"

[dut]
baud_rate = 115200
timeout_ms = 2000
selftest_timeout_ms = 15000
ip = "192.168.1.10"
host_ip = "192.168.1.11"
ping_count = 4

[measurement]
r1_kohm = 12.0
r2_kohm = 5.6
min_volts = 23.0
max_volts = 26.0
settle_ms = 250

[timings]
power_up_ms = 5000

[retry]
max_attempts = 5
"#;

#[test]
fn test_parse_production_settings() {
    let settings = parse_settings(PRODUCTION).expect("Failed to parse settings");

    assert!(!settings.is_debug());
    assert_eq!(settings.station.version, "V1.2.0");
    assert_eq!(settings.run.operator, "Thomas GERARDIN");
    assert!(settings.run.show_all_logs);
    assert_eq!(settings.database.port, 3307);
    assert_eq!(settings.dut.timeout_ms, 2000);
    assert_eq!(settings.dut.ping_count, 4);
    assert_eq!(settings.measurement.min_volts, Volts(23.0));
    assert_eq!(settings.measurement.settle_ms, 250);
    assert_eq!(settings.retry.max_attempts, 5);
}

#[test]
fn test_missing_fields_keep_defaults() {
    let settings = parse_settings(PRODUCTION).expect("Failed to parse settings");

    // [timings] only sets power_up_ms
    assert_eq!(settings.timings.power_up_ms, 5000);
    assert_eq!(settings.timings.relay_settle_ms, 1000);
    assert_eq!(settings.timings.mac_settle_ms, 500);
    // [dut] has no ping timeout
    assert_eq!(settings.dut.ping_timeout_ms, 10_000);
    assert_eq!(settings.station.author, "Thomas GERARDIN");
}

#[test]
fn test_debug_section() {
    let toml_str = r#"
[station]
git_hash = "DEBUG"

[debug]
port = "COM3"
firmware_path = "/tmp/app.hex"
skip_programming = true
"#;

    let settings = parse_settings(toml_str).expect("Failed to parse settings");
    assert!(settings.is_debug());
    assert_eq!(settings.debug.port, "COM3");
    assert!(settings.debug.skip_programming);
    assert!(settings.debug.mac_file.as_os_str().is_empty());
}

#[test]
fn test_parse_rejects_invalid_toml() {
    let result = parse_settings("[dut\nbaud_rate = 9600");
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::ParseError(_)))
    ));
}

#[test]
fn test_parse_runs_validation() {
    let toml_str = r#"
[retry]
max_attempts = 0
"#;
    assert!(matches!(
        parse_settings(toml_str),
        Err(Error::Config(ConfigError::InvalidRetryAttempts(0)))
    ));
}

#[test]
fn test_load_settings_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(PRODUCTION.as_bytes()).expect("write");

    let settings = load_settings(file.path()).expect("Failed to load settings");
    assert_eq!(settings.run.article, "IV90115");
}
