//! Unit tests run against the public API.

mod unit;
