//! Configuration module for the bench sequencer.
//!
//! Two layers: local bench settings loaded from TOML, and the per-product
//! test configuration (config.json) fetched from the database at
//! initialisation.

mod items;
mod loader;
pub mod pins;
mod settings;
pub mod units;
mod validation;

pub use items::{ConfigItem, ConfigItems};
pub use loader::{load_settings, parse_settings};
pub use pins::{DaqPin, Relay};
pub use settings::{
    BenchSettings, DatabaseSettings, DebugSettings, DutSettings, MeasurementSettings,
    RetrySettings, RunSettings, StationSettings, Timings, DEBUG_HASH,
};
pub use validation::validate_settings;

// Re-export unit types at config level
pub use units::{Divider, KiloOhms, Volts};
