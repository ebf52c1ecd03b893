//! Database seam.
//!
//! The production backend is a MySQL schema reached by an external layer;
//! the bench only needs generic create / read / update on JSON-shaped rows.

mod memory;
pub mod record;

use serde_json::{Map, Value};

use crate::error::DatabaseError;

pub use memory::MemoryDatabase;
pub use record::{StoredValue, ValueRecord};

/// One table row, column name to value.
pub type Row = Map<String, Value>;

/// Generic row access used by the steps.
pub trait Database {
    /// Insert a row and return its generated id.
    fn create(&mut self, table: &str, row: Row) -> Result<i64, DatabaseError>;

    /// Fetch a row by primary key.
    fn get_by_id(&mut self, table: &str, id: i64) -> Result<Option<Row>, DatabaseError>;

    /// Fetch every row whose `column` equals `value`.
    fn get_by_column(
        &mut self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, DatabaseError>;

    /// Merge `changes` into an existing row.
    fn update_by_id(&mut self, table: &str, id: i64, changes: Row) -> Result<(), DatabaseError>;

    /// Close the connection. Later calls fail with [`DatabaseError::NotConnected`].
    fn disconnect(&mut self);
}

/// Build a row from a JSON object literal.
///
/// Non-object values give an empty row.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

/// Read an integer column, accepting numeric strings.
pub fn column_i64(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_i64_accepts_text() {
        let r = row(json!({"a": 3, "b": "12", "c": "x"}));
        assert_eq!(column_i64(&r, "a"), Some(3));
        assert_eq!(column_i64(&r, "b"), Some(12));
        assert_eq!(column_i64(&r, "c"), None);
        assert_eq!(column_i64(&r, "missing"), None);
    }

    #[test]
    fn test_row_from_non_object() {
        assert!(row(json!([1, 2])).is_empty());
    }
}
