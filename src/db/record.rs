//! Key/value measurement records.
//!
//! Every value recorded during a run lands in one of the `skvp_*` tables,
//! chosen by the kind of value. Rows are anchored on a `step_name` row.

use serde_json::{json, Value};

use crate::error::{Error, RecordError, Result};

use super::{row, Database};

/// Value kinds the bench records.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// Integer or float measurement.
    Number(f64),
    /// Free text.
    Text(String),
    /// Binary content.
    Blob(Vec<u8>),
    /// Structured document.
    Document(Value),
}

impl StoredValue {
    /// Destination table.
    pub fn table(&self) -> &'static str {
        match self {
            StoredValue::Number(_) => "skvp_float",
            StoredValue::Text(_) => "skvp_char",
            StoredValue::Blob(_) => "skvp_file",
            StoredValue::Document(_) => "skvp_json",
        }
    }

    /// Value column of the destination table.
    pub fn column(&self) -> &'static str {
        match self {
            StoredValue::Number(_) => "val_float",
            StoredValue::Text(_) => "val_char",
            StoredValue::Blob(_) => "val_file",
            StoredValue::Document(_) => "val_json",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            StoredValue::Number(v) => json!(v),
            StoredValue::Text(s) => json!(s),
            StoredValue::Blob(bytes) => json!(bytes),
            StoredValue::Document(doc) => doc.clone(),
        }
    }
}

impl From<f64> for StoredValue {
    fn from(v: f64) -> Self {
        StoredValue::Number(v)
    }
}

impl From<i64> for StoredValue {
    fn from(v: i64) -> Self {
        StoredValue::Number(v as f64)
    }
}

impl From<i32> for StoredValue {
    fn from(v: i32) -> Self {
        StoredValue::Number(f64::from(v))
    }
}

impl From<usize> for StoredValue {
    fn from(v: usize) -> Self {
        StoredValue::Number(v as f64)
    }
}

impl From<&str> for StoredValue {
    fn from(v: &str) -> Self {
        StoredValue::Text(v.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(v: String) -> Self {
        StoredValue::Text(v)
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(v: Vec<u8>) -> Self {
        StoredValue::Blob(v)
    }
}

impl From<Value> for StoredValue {
    fn from(v: Value) -> Self {
        StoredValue::Document(v)
    }
}

/// One value to record, built fluently.
///
/// # Example
///
/// ```rust,ignore
/// let record = ValueRecord::new(step_id, "IVE1_V", 24.1)
///     .unit("V")
///     .limits(23.5, 25.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRecord {
    step_name_id: i64,
    key: String,
    value: StoredValue,
    unit: String,
    min: Option<f64>,
    max: Option<f64>,
    valid: bool,
}

impl ValueRecord {
    /// Record `value` under `key` for a step.
    pub fn new(step_name_id: i64, key: impl Into<String>, value: impl Into<StoredValue>) -> Self {
        Self {
            step_name_id,
            key: key.into(),
            value: value.into(),
            unit: String::new(),
            min: None,
            max: None,
            valid: false,
        }
    }

    /// Measurement unit (numbers only).
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Configured acceptance window (numbers only).
    pub fn limits(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Mark the value as accepted.
    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    /// Recorded value.
    pub fn value(&self) -> &StoredValue {
        &self.value
    }

    /// Destination row.
    pub fn to_row(&self) -> super::Row {
        let mut data = row(json!({
            "step_name_id": self.step_name_id,
            "key": self.key,
        }));
        data.insert(self.value.column().into(), self.value.to_json());
        if let StoredValue::Number(_) = self.value {
            data.insert("unit".into(), json!(self.unit));
            data.insert("min_configured".into(), json!(self.min));
            data.insert("max_configured".into(), json!(self.max));
            data.insert("valid".into(), json!(u8::from(self.valid)));
        }
        data
    }
}

/// Write a record once the run is anchored on a device-under-test row.
///
/// # Errors
///
/// [`RecordError::NoDeviceUnderTest`] when `device_under_test_id` is unset;
/// nothing is written in that case.
pub fn save_value(
    db: &mut dyn Database,
    device_under_test_id: Option<i64>,
    record: &ValueRecord,
) -> Result<i64> {
    if device_under_test_id.is_none() {
        return Err(Error::Record(RecordError::NoDeviceUnderTest));
    }
    let id = db.create(record.value.table(), record.to_row())?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatabase;

    #[test]
    fn test_routing_by_kind() {
        assert_eq!(StoredValue::from(1.5).table(), "skvp_float");
        assert_eq!(StoredValue::from(3i64).table(), "skvp_float");
        assert_eq!(StoredValue::from("V1.0.0").table(), "skvp_char");
        assert_eq!(StoredValue::from(vec![0u8, 1]).table(), "skvp_file");
        assert_eq!(StoredValue::from(json!({"a": 1})).column(), "val_json");
    }

    #[test]
    fn test_number_row_has_limits() {
        let r = ValueRecord::new(4, "IVE1_V", 24.0)
            .unit("V")
            .limits(23.5, 25.5)
            .to_row();

        assert_eq!(r["val_float"], json!(24.0));
        assert_eq!(r["unit"], json!("V"));
        assert_eq!(r["min_configured"], json!(23.5));
        assert_eq!(r["valid"], json!(0));
    }

    #[test]
    fn test_text_row_has_no_measurement_columns() {
        let r = ValueRecord::new(4, "VERSION", "V1.0.0").valid(true).to_row();
        assert_eq!(r["val_char"], json!("V1.0.0"));
        assert!(!r.contains_key("valid"));
    }

    #[test]
    fn test_no_write_before_device_under_test() {
        let mut db = MemoryDatabase::new();
        let record = ValueRecord::new(1, "VERSION", "V1.0.0");

        let result = save_value(&mut db, None, &record);

        assert_eq!(result, Err(Error::Record(RecordError::NoDeviceUnderTest)));
        assert!(db.rows("skvp_char").is_empty());
    }

    #[test]
    fn test_save_goes_to_routed_table() {
        let mut db = MemoryDatabase::new();
        let record = ValueRecord::new(1, "mac_address_line", 12i64).valid(true);

        let id = save_value(&mut db, Some(1), &record).unwrap();

        let rows = db.rows("skvp_float");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(id));
        assert_eq!(rows[0]["valid"], json!(1));
    }
}
