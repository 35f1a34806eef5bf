//! Dataset descriptors from `info/<id>/index.json`.

use std::{fmt, str::FromStr};

use chrono::DateTime;
use tracing::debug;

use super::{JsonResponse, JsonTable};
use crate::{download::get_text, Error, NoaaClient, Result};

const EPOCH_SECONDS_UNITS: &str = "seconds since 1970-01-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Grid,
    Table,
}

impl DatasetKind {
    /// The ERDDAP protocol name, `griddap` or `tabledap`.
    pub fn protocol(&self) -> &'static str {
        match self {
            DatasetKind::Grid => "griddap",
            DatasetKind::Table => "tabledap",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.protocol())
    }
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "grid" | "griddap" => Ok(DatasetKind::Grid),
            "table" | "tabledap" => Ok(DatasetKind::Table),
            other => Err(Error::query(format!("unknown dataset kind {:?}", other))),
        }
    }
}

/// One row of the info table.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoRow {
    /// `attribute`, `dimension` or `variable`.
    pub row_type: String,
    pub variable_name: String,
    pub attribute_name: String,
    pub data_type: String,
    pub value: String,
}

/// Dimensions, variables and attributes of one dataset on one server.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    pub dataset_id: String,
    /// Server base URL ending in `/`.
    pub base_url: String,
    pub kind: DatasetKind,
    /// Dimension names in server order. Empty for table datasets.
    pub dimensions: Vec<String>,
    /// Variable names in server order.
    pub variables: Vec<String>,
    pub rows: Vec<InfoRow>,
}

impl DatasetInfo {
    /// Builds a descriptor from the body of `info/<id>/index.json`.
    pub fn from_json(dataset_id: &str, base_url: &str, json: &str) -> Result<Self> {
        let response: JsonResponse = serde_json::from_str(json)?;
        let table = response.table;

        let row_type = table.column("Row Type");
        let variable_name = table.column("Variable Name");
        let attribute_name = table.column("Attribute Name");
        let data_type = table.column("Data Type");
        let value = table.column("Value");
        if row_type.is_none() || variable_name.is_none() {
            return Err(Error::decode(format!(
                "info table for {} lacks Row Type / Variable Name columns",
                dataset_id
            )));
        }

        let rows: Vec<InfoRow> = table
            .rows
            .iter()
            .map(|row| InfoRow {
                row_type: JsonTable::cell(row, row_type),
                variable_name: JsonTable::cell(row, variable_name),
                attribute_name: JsonTable::cell(row, attribute_name),
                data_type: JsonTable::cell(row, data_type),
                value: JsonTable::cell(row, value),
            })
            .collect();

        let names_of = |kind: &str| -> Vec<String> {
            rows.iter()
                .filter(|r| r.row_type == kind)
                .map(|r| r.variable_name.clone())
                .collect()
        };
        let dimensions = names_of("dimension");
        let variables = names_of("variable");
        let kind = if dimensions.is_empty() {
            DatasetKind::Table
        } else {
            DatasetKind::Grid
        };

        Ok(DatasetInfo {
            dataset_id: dataset_id.to_string(),
            base_url: crate::config::normalise_base_url(base_url),
            kind,
            dimensions,
            variables,
            rows,
        })
    }

    pub fn is_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d == name)
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    /// Value of attribute `attribute` on `name` (a variable, dimension or `NC_GLOBAL`).
    pub fn attribute(&self, name: &str, attribute: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.row_type == "attribute" && r.variable_name == name && r.attribute_name == attribute)
            .map(|r| r.value.as_str())
    }

    pub fn units(&self, name: &str) -> Option<&str> {
        self.attribute(name, "units")
    }

    /// Declared data type of a dimension or variable, e.g. `double` or `String`.
    pub fn data_type(&self, name: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| (r.row_type == "dimension" || r.row_type == "variable") && r.variable_name == name)
            .map(|r| r.data_type.as_str())
    }

    /// Raw `actual_range` min and max.
    pub fn actual_range(&self, name: &str) -> Option<(String, String)> {
        let value = self.attribute(name, "actual_range")?;
        let mut parts = value.split(',').map(|p| p.trim().to_string());
        match (parts.next(), parts.next()) {
            (Some(min), Some(max)) if !min.is_empty() && !max.is_empty() => Some((min, max)),
            _ => None,
        }
    }

    /// `actual_range` as it must appear in a query. Epoch-second time ranges
    /// become ISO-8601 UTC timestamps.
    pub fn query_range(&self, name: &str) -> Option<(String, String)> {
        let (min, max) = self.actual_range(name)?;
        let is_epoch = self
            .units(name)
            .map(|u| u.starts_with(EPOCH_SECONDS_UNITS))
            .unwrap_or(false);
        if !is_epoch {
            return Some((min, max));
        }
        Some((epoch_to_iso(&min)?, epoch_to_iso(&max)?))
    }
}

fn epoch_to_iso(value: &str) -> Option<String> {
    let seconds = value.trim().parse::<f64>().ok()?;
    let time = DateTime::from_timestamp(seconds.floor() as i64, 0)?;
    Some(time.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Fetches the descriptor for `dataset_id` from the configured server.
pub async fn info(client: &NoaaClient, dataset_id: &str) -> Result<DatasetInfo> {
    let base_url = &client.config().erddap_url;
    let url = format!("{}info/{}/index.json", base_url, dataset_id);
    debug!(%url, "fetching dataset info");

    let body = get_text(client.http(), &url, &[]).await?;
    DatasetInfo::from_json(dataset_id, base_url, &body)
}

// -- Tests -------------------------------------------------------------------
