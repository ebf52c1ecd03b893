//! # bench-sequencer
//!
//! Operator-assisted factory test bench for the UIB 3-in-1 8E8S RS485
//! Ethernet 24VDC board.
//!
//! ## Features
//!
//! - **Step sequence**: initialisation, programming, power-up, self-test,
//!   ping, MAC address and label, then a teardown that always runs
//! - **embedded-hal 1.0**: relays on an MCP23017 reached through an I2C
//!   master bit-banged on DAQ digital lines
//! - **Traceability**: every measurement and answer recorded against the
//!   device-under-test row
//! - **Simulated bench**: DAQ, board console, printer, operator and processes
//!   in [`sim`] for tests and dry runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bench_sequencer::{Bench, Sequence, load_settings};
//!
//! let settings = load_settings("bench.toml")?;
//! let mut bench = Bench::builder()
//!     .settings(settings)
//!     .database(db)
//!     .daq(daq)
//!     .printer(printer)
//!     .build()?;
//!
//! let report = Sequence::standard().run(
//!     &mut bench,
//!     &mut |message: &str, color| println!("[{}] {}", color, message),
//!     &mut |percent| println!("{}%", percent),
//! );
//! println!("passed: {}", report.passed());
//! ```
//!
//! ## Feature Flags
//!
//! - `serial` (default): real serial ports through the `serialport` crate

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Core modules
pub mod bench;
pub mod config;
pub mod db;
pub mod dut;
pub mod error;
pub mod hardware;
pub mod operator;
pub mod printer;
pub mod process;
pub mod retry;
pub mod sequence;
pub mod sim;
pub mod steps;

// Re-exports for ergonomic API
pub use bench::{Bench, BenchBuilder};
pub use config::{load_settings, parse_settings, validate_settings, BenchSettings, ConfigItems};
pub use db::{Database, MemoryDatabase, ValueRecord};
pub use error::{Error, Result};
pub use operator::{Color, Prompt, StepLog};
pub use retry::{Attempt, RetryPolicy};
pub use sequence::{Sequence, SequenceReport};
pub use steps::{Step, StepContext, StepOutcome, StepReport, StepStatus};

// Unit types
pub use config::units::{Divider, KiloOhms, Volts};
