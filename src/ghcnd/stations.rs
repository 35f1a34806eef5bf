//! GHCND station metadata files: stations, inventory, countries and states.
//!
//! See the GHCND readme, sections IV to VII, for the layouts.

use std::{collections::HashMap, sync::Arc};

use arrow::{
    array::{ArrayRef, Float32Array, Int32Array, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};

use crate::{
    deserialise::{parse_lines, Record},
    fixed_width::{lenient, require, text},
    table, NoaaClient, Result,
};

const MISSING_COORD: f32 = -999.9;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Station {
    pub id: String,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
    pub elevation: Option<f32>,
    pub state: Option<String>,
    pub name: String,
    pub gsn_flag: Option<String>,
    pub hcn_crn_flag: Option<String>,
    pub wmo_id: Option<String>,
}

impl Station {
    pub fn country_code(&self) -> &str {
        self.id.get(0..2).unwrap_or("")
    }

    pub fn network_code(&self) -> &str {
        self.id.get(2..3).unwrap_or("")
    }
}

impl Record for Station {
    fn from_line(line: &str) -> Result<Self> {
        let id = require(line, 0, 11)?.to_string();

        Ok(Station {
            id,
            latitude: parse_and_filter_f32(lenient(line, 11, 20)),
            longitude: parse_and_filter_f32(lenient(line, 21, 30)),
            elevation: parse_and_filter_f32(lenient(line, 31, 37)),
            state: text(lenient(line, 38, 40)),
            name: lenient(line, 41, 71).trim().to_string(),
            gsn_flag: text(lenient(line, 72, 75)),
            hcn_crn_flag: text(lenient(line, 76, 79)),
            wmo_id: text(lenient(line, 80, 85)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEntry {
    pub id: String,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
    pub element: String,
    pub first_year: i32,
    pub last_year: i32,
}

impl Record for InventoryEntry {
    fn from_line(line: &str) -> Result<Self> {
        let id = require(line, 0, 11)?.to_string();
        let element = require(line, 31, 35)?.trim().to_string();
        let first_year = parse_year(require(line, 36, 40)?)?;
        let last_year = parse_year(require(line, 41, 45)?)?;

        Ok(InventoryEntry {
            id,
            latitude: parse_and_filter_f32(lenient(line, 12, 20)),
            longitude: parse_and_filter_f32(lenient(line, 21, 30)),
            element,
            first_year,
            last_year,
        })
    }
}

/// A code and name pair from `ghcnd-countries.txt` or `ghcnd-states.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeName {
    pub code: String,
    pub name: String,
}

impl Record for CodeName {
    fn from_line(line: &str) -> Result<Self> {
        Ok(CodeName {
            code: require(line, 0, 2)?.to_string(),
            name: lenient(line, 3, 64).trim().to_string(),
        })
    }
}

fn parse_year(s: &str) -> Result<i32> {
    s.trim()
        .parse()
        .map_err(|_| crate::Error::decode(format!("bad year {:?} in GHCND inventory", s)))
}

fn parse_and_filter_f32(s: &str) -> Option<f32> {
    s.trim().parse::<f32>().ok().filter(|&v| v != MISSING_COORD)
}

async fn fetch_metadata_file(client: &NoaaClient, file_name: &str, refresh: bool) -> Result<String> {
    let url = format!("{}/{}", client.config().endpoints.ghcnd, file_name);
    let path = client.cache("ghcnd", refresh).fetch_named(client.http(), &url).await?;
    Ok(std::fs::read_to_string(path)?)
}

/// All GHCND stations from `ghcnd-stations.txt`.
pub async fn stations(client: &NoaaClient, refresh: bool) -> Result<Vec<Station>> {
    parse_lines(&fetch_metadata_file(client, "ghcnd-stations.txt", refresh).await?)
}

/// Period of record per station and element from `ghcnd-inventory.txt`.
pub async fn inventory(client: &NoaaClient, refresh: bool) -> Result<Vec<InventoryEntry>> {
    parse_lines(&fetch_metadata_file(client, "ghcnd-inventory.txt", refresh).await?)
}

pub async fn countries(client: &NoaaClient, refresh: bool) -> Result<Vec<CodeName>> {
    parse_lines(&fetch_metadata_file(client, "ghcnd-countries.txt", refresh).await?)
}

pub async fn states(client: &NoaaClient, refresh: bool) -> Result<Vec<CodeName>> {
    parse_lines(&fetch_metadata_file(client, "ghcnd-states.txt", refresh).await?)
}

/// Station id to `(lat, lon)` for stations with both coordinates.
pub fn make_lookup(stations: &[Station]) -> HashMap<String, (f32, f32)> {
    let mut lookup = HashMap::new();

    for station in stations {
        if let (Some(lat), Some(lon)) = (station.latitude, station.longitude) {
            lookup.insert(station.id.clone(), (lat, lon));
        }
    }

    lookup
}

pub fn stations_to_batch(stations: &[Station]) -> Result<RecordBatch> {
    let fields = vec![
        table::field("id", DataType::Utf8, None),
        table::field("latitude", DataType::Float32, Some("degrees_north")),
        table::field("longitude", DataType::Float32, Some("degrees_east")),
        table::field("elevation", DataType::Float32, Some("m")),
        table::field("state", DataType::Utf8, None),
        table::field("name", DataType::Utf8, None),
        table::field("gsn_flag", DataType::Utf8, None),
        table::field("hcn_crn_flag", DataType::Utf8, None),
        table::field("wmo_id", DataType::Utf8, None),
    ];
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(stations.iter().map(|s| s.id.as_str()))),
        Arc::new(stations.iter().map(|s| s.latitude).collect::<Float32Array>()),
        Arc::new(stations.iter().map(|s| s.longitude).collect::<Float32Array>()),
        Arc::new(stations.iter().map(|s| s.elevation).collect::<Float32Array>()),
        Arc::new(stations.iter().map(|s| s.state.as_deref()).collect::<StringArray>()),
        Arc::new(StringArray::from_iter_values(stations.iter().map(|s| s.name.as_str()))),
        Arc::new(stations.iter().map(|s| s.gsn_flag.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.hcn_crn_flag.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.wmo_id.as_deref()).collect::<StringArray>()),
    ];

    table::batch(fields, arrays)
}

pub fn inventory_to_batch(entries: &[InventoryEntry]) -> Result<RecordBatch> {
    let fields = vec![
        table::field("id", DataType::Utf8, None),
        table::field("latitude", DataType::Float32, Some("degrees_north")),
        table::field("longitude", DataType::Float32, Some("degrees_east")),
        table::field("element", DataType::Utf8, None),
        table::field("first_year", DataType::Int32, None),
        table::field("last_year", DataType::Int32, None),
    ];
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.id.as_str()))),
        Arc::new(entries.iter().map(|e| e.latitude).collect::<Float32Array>()),
        Arc::new(entries.iter().map(|e| e.longitude).collect::<Float32Array>()),
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.element.as_str()))),
        Arc::new(Int32Array::from_iter_values(entries.iter().map(|e| e.first_year))),
        Arc::new(Int32Array::from_iter_values(entries.iter().map(|e| e.last_year))),
    ];

    table::batch(fields, arrays)
}

// -- Tests -------------------------------------------------------------------
