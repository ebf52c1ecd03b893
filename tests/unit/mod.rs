//! Unit test harness for bench-sequencer.
//!
//! This module organizes unit tests for the public configuration API.

mod settings_parsing;
mod settings_validation;
