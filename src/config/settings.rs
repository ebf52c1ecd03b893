//! Bench settings - root configuration structure.

use std::path::PathBuf;

use serde::Deserialize;

use super::units::{Divider, KiloOhms, Volts};

/// Git hash placeholder of development builds; enables the `[debug]` overrides.
pub const DEBUG_HASH: &str = "DEBUG";

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    /// Identity of the bench software.
    pub station: StationSettings,
    /// Parameters of the current run, usually filled by the host.
    pub run: RunSettings,
    /// Database connection.
    pub database: DatabaseSettings,
    /// Serial link and network identity of the board.
    pub dut: DutSettings,
    /// Input rail measurement.
    pub measurement: MeasurementSettings,
    /// Settle and power-up delays.
    pub timings: Timings,
    /// Retry budget for recoverable checks.
    pub retry: RetrySettings,
    /// Overrides applied when the git hash is [`DEBUG_HASH`].
    pub debug: DebugSettings,
}

impl BenchSettings {
    /// Whether this is a development build.
    pub fn is_debug(&self) -> bool {
        self.station.git_hash == DEBUG_HASH
    }
}

/// Identity of the bench software.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StationSettings {
    /// Bench name, also written on the DUT row.
    pub name: String,
    /// Software version recorded with every run.
    pub version: String,
    /// Git hash of the build, printed on labels.
    pub git_hash: String,
    /// Author of the test software.
    pub author: String,
    /// Header line of the label.
    pub company: String,
    /// Product list this bench is built for.
    pub product_list_id_default: String,
    /// Name of the `parameters` row holding config.json.
    pub config_json_name: String,
    /// Directory where config.json is materialised.
    pub work_dir: PathBuf,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            name: "UIB 3 en 1 8E8S RS485 Ehernet 24VDC".into(),
            version: "V1.0.0".into(),
            git_hash: DEBUG_HASH.into(),
            author: "Thomas GERARDIN".into(),
            company: "CAPSYS".into(),
            product_list_id_default: "6".into(),
            config_json_name: "config_IV90115".into(),
            work_dir: PathBuf::from("."),
        }
    }
}

/// Parameters of the current run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Operator as "First Last".
    pub operator: String,
    /// Customer order / delivery note number.
    pub command_number: String,
    /// Manufacturing order.
    pub of: String,
    /// Article reference, also the DUT serial number.
    pub article: String,
    /// Article revision index.
    pub indice: String,
    /// Product list id selected for the run.
    pub product_list_id: String,
    /// Raise diagnostics to debug level.
    pub show_all_logs: bool,
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Schema name.
    pub database: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3306,
            user: "root".into(),
            password: "root".into(),
            database: "capsys_db_bdt".into(),
        }
    }
}

/// Board under test link settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DutSettings {
    /// Serial baud rate (8N1).
    pub baud_rate: u32,
    /// Default serial read timeout.
    pub timeout_ms: u64,
    /// Time allowed for the self-test to print READY.
    pub selftest_timeout_ms: u64,
    /// Board IP address.
    pub ip: String,
    /// Address the bench network card must use.
    pub host_ip: String,
    /// Echo requests per ping attempt.
    pub ping_count: u32,
    /// Time allowed for one ping attempt.
    pub ping_timeout_ms: u64,
}

impl Default for DutSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            timeout_ms: 1000,
            selftest_timeout_ms: 10_000,
            ip: "192.168.1.10".into(),
            host_ip: "192.168.1.11".into(),
            ping_count: 2,
            ping_timeout_ms: 10_000,
        }
    }
}

/// Input rail measurement settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeasurementSettings {
    /// Divider top resistor.
    pub r1_kohm: KiloOhms,
    /// Divider bottom resistor.
    pub r2_kohm: KiloOhms,
    /// Lowest accepted rail voltage.
    pub min_volts: Volts,
    /// Highest accepted rail voltage.
    pub max_volts: Volts,
    /// Wait after closing the measurement relay.
    pub settle_ms: u32,
}

impl MeasurementSettings {
    /// Divider in front of the analog inputs.
    pub fn divider(&self) -> Divider {
        Divider::new(self.r1_kohm, self.r2_kohm)
    }

    /// Check a rail voltage against the window (bounds included).
    pub fn contains(&self, volts: Volts) -> bool {
        volts >= self.min_volts && volts <= self.max_volts
    }
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            r1_kohm: KiloOhms(12.0),
            r2_kohm: KiloOhms(5.6),
            min_volts: Volts(23.5),
            max_volts: Volts(25.5),
            settle_ms: 500,
        }
    }
}

/// Settle and power-up delays in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// After the relay defaults are applied.
    pub relay_settle_ms: u32,
    /// After the operator powers the bench back on.
    pub power_up_ms: u32,
    /// Before the first self-test command.
    pub selftest_delay_ms: u32,
    /// After writing the MAC address.
    pub mac_settle_ms: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            relay_settle_ms: 1000,
            power_up_ms: 3000,
            selftest_delay_ms: 1000,
            mac_settle_ms: 500,
        }
    }
}

impl Timings {
    /// All delays set to zero, for simulated benches.
    pub fn none() -> Self {
        Self {
            relay_settle_ms: 0,
            power_up_ms: 0,
            selftest_delay_ms: 0,
            mac_settle_ms: 0,
        }
    }
}

/// Retry budget.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per recoverable check, first one included.
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Development build overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Serial port of the developer's board.
    pub port: String,
    /// Firmware used instead of asking the operator.
    pub firmware_path: PathBuf,
    /// MAC ledger used without attributing addresses.
    pub mac_file: PathBuf,
    /// Skip flashing entirely.
    pub skip_programming: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            port: "COM11".into(),
            firmware_path: PathBuf::from("T:\\SW\\00\\083\\A\\SW00083_A01r_UIB_APP.hex"),
            mac_file: PathBuf::new(),
            skip_programming: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bench_wiring() {
        let settings = BenchSettings::default();
        assert!(settings.is_debug());
        assert_eq!(settings.dut.baud_rate, 115_200);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.station.product_list_id_default, "6");
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let m = MeasurementSettings::default();
        assert!(m.contains(Volts(23.5)));
        assert!(m.contains(Volts(25.5)));
        assert!(!m.contains(Volts(23.49)));
        assert!(!m.contains(Volts(25.51)));
    }
}
