//! In-memory database with the bench schema.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::error::DatabaseError;

use super::{column_i64, Database, Row};

/// Tables of the bench schema.
pub const TABLES: [&str; 13] = [
    "operator",
    "product_list",
    "bench_composition",
    "external_device",
    "script",
    "parameters_group",
    "parameters",
    "device_under_test",
    "step_name",
    "skvp_float",
    "skvp_char",
    "skvp_file",
    "skvp_json",
];

#[derive(Debug, Default)]
struct Tables {
    rows: BTreeMap<String, Vec<Row>>,
    next_id: BTreeMap<String, i64>,
    connected: bool,
}

/// Database kept in memory.
///
/// Clones share the same tables, so a test can keep a handle while the
/// bench owns another.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    inner: Rc<RefCell<Tables>>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// Empty, connected database with every bench table.
    pub fn new() -> Self {
        let mut tables = Tables {
            connected: true,
            ..Tables::default()
        };
        for name in TABLES {
            tables.rows.insert(name.to_string(), Vec::new());
            tables.next_id.insert(name.to_string(), 1);
        }
        Self {
            inner: Rc::new(RefCell::new(tables)),
        }
    }

    /// Database seeded from `{"table": [row, ...], ...}`.
    ///
    /// Rows keep their `id` when they carry one.
    pub fn from_json(seed: &Value) -> Result<Self, DatabaseError> {
        let db = Self::new();
        let tables = seed.as_object().ok_or_else(|| DatabaseError::InvalidRow {
            table: "<seed>".into(),
            reason: "expected an object of tables".into(),
        })?;
        for (table, rows) in tables {
            let rows = rows.as_array().ok_or_else(|| DatabaseError::InvalidRow {
                table: table.clone(),
                reason: "expected an array of rows".into(),
            })?;
            for row in rows {
                let row = row.as_object().cloned().ok_or_else(|| DatabaseError::InvalidRow {
                    table: table.clone(),
                    reason: "expected an object".into(),
                })?;
                db.insert(table, row)?;
            }
        }
        Ok(db)
    }

    /// Whether [`Database::disconnect`] has not been called.
    pub fn is_connected(&self) -> bool {
        self.inner.borrow().connected
    }

    /// Copy of every row of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .borrow()
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn insert(&self, table: &str, mut row: Row) -> Result<i64, DatabaseError> {
        let mut tables = self.inner.borrow_mut();
        let next = tables
            .next_id
            .get(table)
            .copied()
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;
        let id = match column_i64(&row, "id") {
            Some(id) => id,
            None => {
                row.insert("id".into(), Value::from(next));
                next
            }
        };
        tables.next_id.insert(table.to_string(), next.max(id + 1));
        if let Some(rows) = tables.rows.get_mut(table) {
            rows.push(row);
        }
        Ok(id)
    }

    fn check_connected(&self) -> Result<(), DatabaseError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DatabaseError::NotConnected)
        }
    }
}

impl Database for MemoryDatabase {
    fn create(&mut self, table: &str, row: Row) -> Result<i64, DatabaseError> {
        self.check_connected()?;
        let id = self.insert(table, row)?;
        debug!(table = table, id = id, "row created");
        Ok(id)
    }

    fn get_by_id(&mut self, table: &str, id: i64) -> Result<Option<Row>, DatabaseError> {
        self.check_connected()?;
        let tables = self.inner.borrow();
        let rows = tables
            .rows
            .get(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;
        Ok(rows.iter().find(|r| column_i64(r, "id") == Some(id)).cloned())
    }

    fn get_by_column(
        &mut self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, DatabaseError> {
        self.check_connected()?;
        let tables = self.inner.borrow();
        let rows = tables
            .rows
            .get(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;
        let found: Vec<Row> = rows
            .iter()
            .filter(|r| r.get(column).is_some_and(|v| loosely_equal(v, value)))
            .cloned()
            .collect();
        debug!(table = table, column = column, matches = found.len(), "rows selected");
        Ok(found)
    }

    fn update_by_id(&mut self, table: &str, id: i64, changes: Row) -> Result<(), DatabaseError> {
        self.check_connected()?;
        let mut tables = self.inner.borrow_mut();
        let rows = tables
            .rows
            .get_mut(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;
        let row = rows
            .iter_mut()
            .find(|r| column_i64(r, "id") == Some(id))
            .ok_or_else(|| DatabaseError::RowNotFound {
                table: table.to_string(),
                id,
            })?;
        row.extend(changes);
        debug!(table = table, id = id, "row updated");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.inner.borrow_mut().connected = false;
        debug!("database disconnected");
    }
}

/// Column comparison the way SQL compares a number with numeric text.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
