//! Settings validation.

use crate::error::{ConfigError, Error, Result};

use super::BenchSettings;

/// Validate bench settings.
///
/// Checks:
/// - Voltage window is not empty
/// - Divider resistors are positive
/// - Baud rate is not zero
/// - At least one attempt per recoverable check
/// - The bench product id is set
pub fn validate_settings(settings: &BenchSettings) -> Result<()> {
    let m = &settings.measurement;
    if m.min_volts.0 >= m.max_volts.0 {
        return Err(Error::Config(ConfigError::InvalidVoltageWindow {
            min: m.min_volts.0,
            max: m.max_volts.0,
        }));
    }

    if m.r1_kohm.0 <= 0.0 || m.r2_kohm.0 <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidDivider {
            r1: m.r1_kohm.0,
            r2: m.r2_kohm.0,
        }));
    }

    if settings.dut.baud_rate == 0 {
        return Err(Error::Config(ConfigError::InvalidBaudRate(settings.dut.baud_rate)));
    }

    if settings.retry.max_attempts == 0 {
        return Err(Error::Config(ConfigError::InvalidRetryAttempts(
            settings.retry.max_attempts,
        )));
    }

    if settings.station.product_list_id_default.trim().is_empty() {
        return Err(Error::Config(ConfigError::MissingProductId));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::Volts;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_settings(&BenchSettings::default()).is_ok());
    }

    #[test]
    fn test_inverted_window() {
        let mut settings = BenchSettings::default();
        settings.measurement.min_volts = Volts(26.0);

        let result = validate_settings(&settings);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidVoltageWindow { .. }))
        ));
    }

    #[test]
    fn test_zero_attempts() {
        let mut settings = BenchSettings::default();
        settings.retry.max_attempts = 0;
        assert!(matches!(
            validate_settings(&settings),
            Err(Error::Config(ConfigError::InvalidRetryAttempts(0)))
        ));
    }
}
