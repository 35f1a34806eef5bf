//! Building Arrow record batches from decoded text.
//!
//! Values arrive as optional strings. A column whose present values all parse
//! as numbers becomes `Float64`, anything else stays `Utf8`.

use std::{collections::HashMap, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};

use crate::{Error, Result};

pub const UNITS_KEY: &str = "units";

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub units: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: None,
        }
    }

    pub fn with_units(name: impl Into<String>, units: Option<String>) -> Self {
        Self {
            name: name.into(),
            units: units.filter(|u| !u.is_empty()),
        }
    }
}

pub type Row = Vec<Option<String>>;

/// Parses CSV whose first row holds column names and, when `header_rows` is 2,
/// whose second row holds units (the ERDDAP and IBTrACS layout).
///
/// Every row must have as many fields as the header.
pub fn parse_csv(text: &str, header_rows: usize) -> Result<(Vec<Column>, Vec<Row>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let names = match records.next() {
        Some(record) => record?,
        None => return Err(Error::decode("csv response with no header row")),
    };
    let units = if header_rows >= 2 {
        records.next().transpose()?
    } else {
        None
    };
    for _ in 2..header_rows {
        records.next().transpose()?;
    }

    let columns = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let unit = units.as_ref().and_then(|u| u.get(i)).map(|u| u.trim().to_string());
            Column::with_units(name.trim(), unit)
        })
        .collect();

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        rows.push(record.iter().map(cell).collect());
    }

    Ok((columns, rows))
}

fn cell(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty() && value != "NaN").then(|| value.to_string())
}

/// `parse_csv` followed by `build_inferred`.
pub fn csv_to_batch(text: &str, header_rows: usize) -> Result<RecordBatch> {
    let (columns, rows) = parse_csv(text, header_rows)?;
    build_inferred(&columns, &rows)
}

/// Builds a batch, inferring `Float64` or `Utf8` for every column.
pub fn build_inferred(columns: &[Column], rows: &[Row]) -> Result<RecordBatch> {
    for (i, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(Error::decode(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                columns.len()
            )));
        }
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for (idx, column) in columns.iter().enumerate() {
        let values: Vec<Option<&str>> = rows.iter().map(|r| r[idx].as_deref()).collect();
        let numeric = values
            .iter()
            .flatten()
            .all(|v| v.parse::<f64>().is_ok());

        let (data_type, array): (DataType, ArrayRef) = if numeric {
            let parsed: Vec<Option<f64>> = values
                .iter()
                .map(|v| v.and_then(|v| v.parse::<f64>().ok()))
                .collect();
            (DataType::Float64, Arc::new(Float64Array::from(parsed)))
        } else {
            (DataType::Utf8, Arc::new(StringArray::from(values)))
        };

        fields.push(field(&column.name, data_type, column.units.as_deref()));
        arrays.push(array);
    }

    batch(fields, arrays)
}

/// Nullable field, carrying its units as metadata when known.
pub fn field(name: &str, data_type: DataType, units: Option<&str>) -> Field {
    let field = Field::new(name, data_type, true);
    match units {
        Some(units) => field.with_metadata(HashMap::from([(
            UNITS_KEY.to_string(),
            units.to_string(),
        )])),
        None => field,
    }
}

/// Assembles a batch from fields and matching arrays.
pub fn batch(fields: Vec<Field>, arrays: Vec<ArrayRef>) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(fields));
    if arrays.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Units recorded for `column`, if any.
pub fn units<'a>(batch: &'a RecordBatch, column: &str) -> Option<&'a str> {
    let schema = batch.schema_ref();
    let idx = schema.index_of(column).ok()?;
    schema.field(idx).metadata().get(UNITS_KEY).map(String::as_str)
}

/// String value at `row` of a `Utf8` column.
pub fn string_value(batch: &RecordBatch, column: &str, row: usize) -> Option<String> {
    let array = batch.column_by_name(column)?;
    let strings = array.as_any().downcast_ref::<StringArray>()?;
    (!strings.is_null(row)).then(|| strings.value(row).to_string())
}

/// Float value at `row` of a `Float64` column.
pub fn f64_value(batch: &RecordBatch, column: &str, row: usize) -> Option<f64> {
    let array = batch.column_by_name(column)?;
    let floats = array.as_any().downcast_ref::<Float64Array>()?;
    (!floats.is_null(row)).then(|| floats.value(row))
}

// -- Tests -------------------------------------------------------------------
