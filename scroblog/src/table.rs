//! Raw input tables
//!
//! A [`RawTable`] is the loosely-typed, column-oriented shape in which
//! ingestion hands data to the validator: a mapping from column name to an
//! index-aligned sequence of [`Value`]s. Nothing about it is canonical yet;
//! the record validator turns it into typed scrobble rows.

use chrono::{DateTime, FixedOffset};

use crate::error::{Error, Result};

/// One loosely-typed cell of a raw table.
///
/// Timestamp columns arrive in whichever of these shapes the source used
/// (epoch integers, ISO-like text, or already-zoned instants); the
/// normalizer accepts any of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value
    Null,
    /// Integer, usually an epoch offset
    Int(i64),
    /// Float, usually an epoch offset with a fractional part
    Float(f64),
    /// Free text, or an ISO-8601-ish timestamp
    Text(String),
    /// An already-instantiated, offset-carrying instant
    Instant(DateTime<FixedOffset>),
}

impl Value {
    /// True for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the text content, if this is a `Text` value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value into a raw cell.
    ///
    /// Numbers map to `Int` when integral, `Float` otherwise; anything a
    /// raw table cannot carry (arrays, objects) degrades to `Null` and is
    /// picked up by row validation.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Value::Null,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Value {
        match s {
            Some(s) => Value::Text(s),
            None => Value::Null,
        }
    }
}

/// Column-oriented raw table: equal-length value columns keyed by name.
///
/// Column insertion order is preserved so diagnostics are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<(String, Vec<Value>)>,
}

impl RawTable {
    /// Empty table with no columns
    pub fn new() -> RawTable {
        RawTable::default()
    }

    /// Build a table from named columns, enforcing equal lengths
    pub fn with_columns(columns: Vec<(String, Vec<Value>)>) -> Result<RawTable> {
        let mut table = RawTable::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Build a table from row-oriented JSON-shaped records.
    ///
    /// Columns are the union of all record keys in first-seen order; a
    /// record without a given key contributes `Null` to that column.
    pub fn from_records(records: &[serde_json::Map<String, serde_json::Value>]) -> RawTable {
        let mut table = RawTable::new();
        for (row, record) in records.iter().enumerate() {
            for key in record.keys() {
                if !table.has_column(key) {
                    // backfill the rows seen before this column appeared
                    table.columns.push((key.clone(), vec![Value::Null; row]));
                }
            }
            for (name, values) in &mut table.columns {
                let cell = record
                    .get(name.as_str())
                    .map(Value::from_json)
                    .unwrap_or(Value::Null);
                values.push(cell);
            }
        }
        table
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when a column with this name exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Borrow a column's values by name
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Append a column, enforcing length agreement with existing columns
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(Error::InvalidArgument(format!(
                "Column already present: {}",
                name
            )));
        }
        if !self.columns.is_empty() && values.len() != self.len() {
            return Err(Error::InvalidData(format!(
                "Column '{}' has {} values, expected {}",
                name,
                values.len(),
                self.len()
            )));
        }
        self.columns.push((name, values));
        Ok(())
    }

    /// Rename a column in place; a missing source column is a no-op
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some((name, _)) = self.columns.iter_mut().find(|(n, _)| n == from) {
            *name = to.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_columns_rejects_unequal_lengths() {
        let result = RawTable::with_columns(vec![
            ("track".to_string(), vec![Value::from("A"), Value::from("B")]),
            ("artist".to_string(), vec![Value::from("X")]),
        ]);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_from_records_unions_keys() {
        let records: Vec<serde_json::Map<String, serde_json::Value>> = vec![
            serde_json::from_str(r#"{"track":"A","artist":"X"}"#).unwrap(),
            serde_json::from_str(r#"{"track":"B","artist":"Y","album":"Alb"}"#).unwrap(),
        ];
        let table = RawTable::from_records(&records);
        assert_eq!(table.len(), 2);
        // album appeared on the second row only; the first is backfilled
        assert_eq!(
            table.column("album").unwrap(),
            &[Value::Null, Value::from("Alb")]
        );
    }

    #[test]
    fn test_from_json_number_mapping() {
        let int = serde_json::json!(86400000);
        let float = serde_json::json!(1.5);
        assert_eq!(Value::from_json(&int), Value::Int(86400000));
        assert_eq!(Value::from_json(&float), Value::Float(1.5));
    }

    #[test]
    fn test_rename_column() {
        let mut table = RawTable::with_columns(vec![(
            "date".to_string(),
            vec![Value::Int(0)],
        )])
        .unwrap();
        table.rename_column("date", "timestamp");
        assert!(table.has_column("timestamp"));
        assert!(!table.has_column("date"));
    }
}
