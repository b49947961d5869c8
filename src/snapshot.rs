//! Table snapshots: the rows returned by one full scan of one table.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;

/// A single scalar value read from a source column.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// Canonical string representation, fed to the fingerprint hasher.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("None"),
            CellValue::Bool(true) => f.write_str("True"),
            CellValue::Bool(false) => f.write_str("False"),
            CellValue::Int(v) => write!(f, "{v}"),
            CellValue::UInt(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(v) => f.write_str(v),
            CellValue::Bytes(v) => f.write_str(&hex::encode(v)),
            CellValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            CellValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            CellValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Int(value.into())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// One row: column name to value, in the order the driver reported the columns.
pub type TableRow = IndexMap<String, CellValue>;

/// Ordered rows from a full, unordered scan of one table.
///
/// Row order is whatever the backend returned; nothing here sorts it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSnapshot {
    rows: Vec<TableRow>,
}

impl TableSnapshot {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn first(&self) -> Option<&TableRow> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<TableRow> for TableSnapshot {
    fn from_iter<I: IntoIterator<Item = TableRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Build a row from `(column, value)` pairs, keeping their order.
pub fn row<K, V, I>(cells: I) -> TableRow
where
    K: Into<String>,
    V: Into<CellValue>,
    I: IntoIterator<Item = (K, V)>,
{
    cells
        .into_iter()
        .map(|(column, value)| (column.into(), value.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_strings() {
        assert_eq!(CellValue::Null.to_string(), "None");
        assert_eq!(CellValue::Bool(true).to_string(), "True");
        assert_eq!(CellValue::Int(-42).to_string(), "-42");
        assert_eq!(CellValue::UInt(7).to_string(), "7");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::from("Alice").to_string(), "Alice");
        assert_eq!(CellValue::Bytes(vec![0xde, 0xad]).to_string(), "dead");
    }

    #[test]
    fn test_temporal_canonical_strings() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(CellValue::Date(date).to_string(), "2024-03-09");

        let ts = date.and_hms_opt(7, 5, 0).unwrap();
        assert_eq!(CellValue::Timestamp(ts).to_string(), "2024-03-09 07:05:00");

        let ts_micros = date.and_hms_micro_opt(7, 5, 0, 250).unwrap();
        assert_eq!(
            CellValue::Timestamp(ts_micros).to_string(),
            "2024-03-09 07:05:00.000250"
        );
    }

    #[test]
    fn test_row_keeps_column_order() {
        let r = row([("b", 1), ("a", 2), ("c", 3)]);
        let columns: Vec<&str> = r.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_option_maps_to_null() {
        let none: Option<&str> = None;
        assert!(CellValue::from(none).is_null());
        assert_eq!(CellValue::from(Some("x")), CellValue::Text("x".into()));
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot: TableSnapshot = vec![row([("id", 1)]), row([("id", 2)])]
            .into_iter()
            .collect();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.first().unwrap()["id"], CellValue::Int(1));
        assert!(TableSnapshot::default().first().is_none());
    }
}
