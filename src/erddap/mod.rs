//! ERDDAP dataset discovery and data access.
//!
//! ERDDAP does all the subsetting server side. This module only resolves the
//! dataset descriptor, turns user constraints into the query grammar, caches
//! the response file and decodes it.

pub mod griddap;
pub mod info;
pub mod query;
pub mod search;
pub mod tabledap;

use std::path::PathBuf;

use arrow::record_batch::RecordBatch;
use serde::Deserialize;
use serde_json::Value;

pub use griddap::grid;
pub use info::{info, DatasetInfo, DatasetKind, InfoRow};
pub use query::{Constraint, Fields, GridQuery, Op, OrderBy, Stride, TableQuery, Units};
pub use search::{list_datasets, search, SearchHit};
pub use tabledap::table;

/// Response file format requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Decoded into a table.
    #[default]
    Csv,
    /// NetCDF, kept on disk as fetched.
    Nc,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Nc => "nc",
        }
    }
}

/// A fetched response: the cache file, and its decoded table for CSV.
#[derive(Debug, Clone)]
pub struct ErddapData {
    pub path: PathBuf,
    pub table: Option<RecordBatch>,
}

/// The `{"table": {...}}` envelope of ERDDAP's `.json` responses.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonResponse {
    pub table: JsonTable,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonTable {
    pub column_names: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl JsonTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.column_names
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Cell text; `null` and missing cells are empty.
    pub fn cell(row: &[Value], idx: Option<usize>) -> String {
        match idx.and_then(|i| row.get(i)) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_read_json_table_cells() {
        let json = r#"{"table": {"columnNames": ["Row Type", "Value"], "rows": [["attribute", 1.5], ["variable", null]]}}"#;
        let response: JsonResponse = serde_json::from_str(json).unwrap();
        let table = response.table;

        let value = table.column("value");
        assert_eq!(value, Some(1));
        assert_eq!(JsonTable::cell(&table.rows[0], value), "1.5");
        assert_eq!(JsonTable::cell(&table.rows[1], value), "");
        assert_eq!(JsonTable::cell(&table.rows[0], table.column("row type")), "attribute");
    }

    #[test]
    fn should_map_format_extensions() {
        assert_eq!(Format::default(), Format::Csv);
        assert_eq!(Format::Nc.extension(), "nc");
    }
}
