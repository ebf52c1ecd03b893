//! File-backed pool of MAC addresses reserved for the product.
//!
//! ```json
//! {
//!   "entries": [
//!     { "mac_address": "00:80:E1:00:00:01", "product": "IV90115", "delivery_date": "2026-10-17", "bl": "CMD-12" },
//!     { "mac_address": "00:80:E1:00:00:02", "product": "", "delivery_date": "", "bl": "" }
//!   ]
//! }
//! ```
//!
//! An entry without product is free. Assignments stay in memory until
//! [`MacLedger::save`], so a board that rejects its address does not consume
//! one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

use super::mac::MacAddress;

/// One ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Reserved address.
    pub mac_address: MacAddress,
    /// Article the address went to; empty when free.
    #[serde(default)]
    pub product: String,
    /// Assignment date, `YYYY-MM-DD`.
    #[serde(default)]
    pub delivery_date: String,
    /// Delivery note or command number.
    #[serde(default)]
    pub bl: String,
}

impl LedgerEntry {
    /// Whether the address is still available.
    pub fn is_free(&self) -> bool {
        self.product.is_empty()
    }
}

/// Address handed out by [`MacLedger::assign`] or [`MacLedger::next_free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Assigned address.
    pub mac_address: MacAddress,
    /// 1-based ledger line.
    pub row: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    entries: Vec<LedgerEntry>,
}

/// Ledger loaded from disk.
#[derive(Debug)]
pub struct MacLedger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
}

impl MacLedger {
    /// Load the ledger.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let file: LedgerFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::InvalidMacLedger(e.to_string()))?;
        debug!(path = %path.display(), entries = file.entries.len(), "MAC ledger loaded");
        Ok(Self {
            path,
            entries: file.entries,
        })
    }

    /// Every ledger line.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// First free address, left free.
    pub fn next_free(&self) -> Option<Assignment> {
        let index = self.entries.iter().position(LedgerEntry::is_free)?;
        Some(Assignment {
            mac_address: self.entries[index].mac_address,
            row: index + 1,
        })
    }

    /// Take the first free address and attribute it to `product`.
    ///
    /// A blank `product` would leave the entry free, so it is refused.
    pub fn assign(&mut self, product: &str, delivery_date: &str, bl: &str) -> Option<Assignment> {
        if product.trim().is_empty() {
            return None;
        }
        let assignment = self.next_free()?;
        let entry = &mut self.entries[assignment.row - 1];
        entry.product = product.to_string();
        entry.delivery_date = delivery_date.to_string();
        entry.bl = bl.to_string();
        Some(assignment)
    }

    /// Write the ledger back.
    pub fn save(&self) -> Result<(), ConfigError> {
        let file = LedgerFile {
            entries: self.entries.clone(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| ConfigError::InvalidMacLedger(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;
        debug!(path = %self.path.display(), "MAC ledger saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ledger_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"entries": [
                {{"mac_address": "00:80:E1:00:00:01", "product": "IV90115", "delivery_date": "2026-01-02", "bl": "7"}},
                {{"mac_address": "00:80:E1:00:00:02"}},
                {{"mac_address": "00:80:E1:00:00:03", "product": "", "delivery_date": "", "bl": ""}}
            ]}}"#
        )
        .unwrap();
        file
    }

    #[test]
    fn test_assign_first_free() {
        let file = ledger_file();
        let mut ledger = MacLedger::open(file.path()).unwrap();

        let first = ledger.assign("IV90115", "2026-10-17", "CMD-1").unwrap();
        let second = ledger.assign("IV90115", "2026-10-17", "CMD-1").unwrap();

        assert_eq!(first.row, 2);
        assert_eq!(first.mac_address.to_string(), "00:80:E1:00:00:02");
        assert_eq!(second.row, 3);
        assert!(ledger.assign("IV90115", "", "").is_none());
    }

    #[test]
    fn test_next_free_does_not_consume() {
        let file = ledger_file();
        let ledger = MacLedger::open(file.path()).unwrap();

        let a = ledger.next_free().unwrap();
        let b = ledger.next_free().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.row, 2);
        assert!(ledger.entries()[1].is_free());
    }

    #[test]
    fn test_blank_product_is_not_attributed() {
        let file = ledger_file();
        let mut ledger = MacLedger::open(file.path()).unwrap();

        assert!(ledger.assign("", "2026-10-17", "CMD-1").is_none());
        assert!(ledger.assign("  ", "2026-10-17", "CMD-1").is_none());
        assert!(ledger.entries()[1].is_free());

        let taken = ledger.assign("IV90115", "2026-10-17", "CMD-1").unwrap();
        assert_eq!(taken.row, 2);
        assert_eq!(ledger.next_free().unwrap().row, 3);
    }

    #[test]
    fn test_only_save_persists() {
        let file = ledger_file();
        let mut ledger = MacLedger::open(file.path()).unwrap();
        ledger.assign("IV90115", "2026-10-17", "CMD-1").unwrap();

        assert!(MacLedger::open(file.path()).unwrap().entries()[1].is_free());

        ledger.save().unwrap();
        let reloaded = MacLedger::open(file.path()).unwrap();
        assert_eq!(reloaded.entries()[1].product, "IV90115");
        assert_eq!(reloaded.entries()[1].bl, "CMD-1");
    }

    #[test]
    fn test_bad_address_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"entries": [{{"mac_address": "00:80:E1"}}]}}"#).unwrap();

        assert!(matches!(
            MacLedger::open(file.path()),
            Err(ConfigError::InvalidMacLedger(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MacLedger::open("/nonexistent/mac.json"),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
