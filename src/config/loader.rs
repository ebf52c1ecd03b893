//! Settings loading from files.

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::BenchSettings;

/// Load bench settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
///
/// ```rust,ignore
/// use bench_sequencer::load_settings;
///
/// let settings = load_settings("bench.toml")?;
/// ```
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<BenchSettings> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Config(ConfigError::IoError(e.to_string())))?;

    parse_settings(&content)
}

/// Parse bench settings from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_settings(content: &str) -> Result<BenchSettings> {
    let settings: BenchSettings = toml::from_str(content)
        .map_err(|e| Error::Config(ConfigError::ParseError(e.message().to_string())))?;

    super::validation::validate_settings(&settings)?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_settings_uses_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings.dut.ip, "192.168.1.10");
        assert_eq!(settings.measurement.min_volts.0, 23.5);
    }

    #[test]
    fn test_parse_run_section() {
        let toml = r#"
[station]
git_hash = "a1b2c3d"

[run]
operator = "Thomas GERARDIN"
article = "IV90115"
indice = "A"
product_list_id = "6"
"#;

        let settings = parse_settings(toml).unwrap();
        assert!(!settings.is_debug());
        assert_eq!(settings.run.article, "IV90115");
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let toml = r#"
[dut]
baud_rate = "fast"
"#;
        assert!(matches!(
            parse_settings(toml),
            Err(Error::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_settings("/nonexistent/bench.toml"),
            Err(Error::Config(ConfigError::IoError(_)))
        ));
    }
}
