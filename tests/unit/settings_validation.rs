//! Unit tests for bench settings validation.

use bench_sequencer::config::{validate_settings, BenchSettings, KiloOhms, Volts};
use bench_sequencer::error::{ConfigError, Error};

#[test]
fn test_default_settings_pass_validation() {
    assert!(validate_settings(&BenchSettings::default()).is_ok());
}

#[test]
fn test_empty_voltage_window() {
    let mut settings = BenchSettings::default();
    settings.measurement.min_volts = Volts(24.0);
    settings.measurement.max_volts = Volts(24.0);

    let result = validate_settings(&settings);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidVoltageWindow { .. }))
    ));
}

#[test]
fn test_zero_divider_resistor() {
    let mut settings = BenchSettings::default();
    settings.measurement.r2_kohm = KiloOhms(0.0);

    assert!(matches!(
        validate_settings(&settings),
        Err(Error::Config(ConfigError::InvalidDivider { .. }))
    ));
}

#[test]
fn test_zero_baud_rate() {
    let mut settings = BenchSettings::default();
    settings.dut.baud_rate = 0;

    assert!(matches!(
        validate_settings(&settings),
        Err(Error::Config(ConfigError::InvalidBaudRate(0)))
    ));
}

#[test]
fn test_blank_product_id() {
    let mut settings = BenchSettings::default();
    settings.station.product_list_id_default = "  ".into();

    assert!(matches!(
        validate_settings(&settings),
        Err(Error::Config(ConfigError::MissingProductId))
    ));
}

#[test]
fn test_builder_rejects_invalid_settings() {
    let mut settings = BenchSettings::default();
    settings.retry.max_attempts = 0;

    let result = bench_sequencer::Bench::builder()
        .settings(settings)
        .connector(bench_sequencer::sim::SimBoard::new().connector())
        .build();
    assert!(result.is_err());
}
