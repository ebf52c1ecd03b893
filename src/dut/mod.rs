//! Board under test: serial console, self-test and MAC address handling.

pub mod ledger;
pub mod link;
pub mod mac;
pub mod selftest;

pub use ledger::{Assignment, LedgerEntry, MacLedger};
#[cfg(feature = "serial")]
pub use link::SerialConnector;
pub use link::{DutConnector, DutLink, DutSession, LinkSettings};
pub use mac::{MacAddress, ParseMacError};
pub use selftest::SelfTestReport;
