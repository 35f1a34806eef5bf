//! ISD station history (`isd-history.csv`) and radius search.

use std::{fs, sync::Arc};

use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{table, NoaaClient, Result};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Deserialize)]
struct HistoryRow {
    #[serde(rename = "USAF")]
    usaf: String,
    #[serde(rename = "WBAN")]
    wban: String,
    #[serde(rename = "STATION NAME")]
    name: Option<String>,
    #[serde(rename = "CTRY")]
    country: Option<String>,
    #[serde(rename = "STATE")]
    state: Option<String>,
    #[serde(rename = "ICAO")]
    icao: Option<String>,
    #[serde(rename = "LAT")]
    lat: Option<f64>,
    #[serde(rename = "LON")]
    lon: Option<f64>,
    #[serde(rename = "ELEV(M)")]
    elevation: Option<f64>,
    #[serde(rename = "BEGIN")]
    begin: Option<String>,
    #[serde(rename = "END")]
    end: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsdStation {
    pub usaf: String,
    pub wban: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub icao: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Metres.
    pub elevation: Option<f64>,
    pub begin: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

fn ymd(s: Option<String>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s?.trim(), "%Y%m%d").ok()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl From<HistoryRow> for IsdStation {
    fn from(row: HistoryRow) -> Self {
        IsdStation {
            usaf: row.usaf.trim().to_string(),
            wban: row.wban.trim().to_string(),
            name: non_blank(row.name),
            country: non_blank(row.country),
            state: non_blank(row.state),
            icao: non_blank(row.icao),
            latitude: row.lat,
            longitude: row.lon,
            elevation: row.elevation.filter(|&e| e > -999.0),
            begin: ymd(row.begin),
            end: ymd(row.end),
        }
    }
}

/// Parses the body of `isd-history.csv`.
pub fn parse_history(text: &str) -> Result<Vec<IsdStation>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut stations = Vec::new();
    for row in reader.deserialize::<HistoryRow>() {
        stations.push(row?.into());
    }
    Ok(stations)
}

/// Every ISD station, from the cached station history file.
pub async fn stations(client: &NoaaClient, refresh: bool) -> Result<Vec<IsdStation>> {
    let url = format!("{}/isd-history.csv", client.config().endpoints.isd);
    let path = client.cache("isd", refresh).fetch_named(client.http(), &url).await?;
    parse_history(&fs::read_to_string(path)?)
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyStation {
    pub station: IsdStation,
    pub distance_km: f64,
}

/// Stations within `radius_km` of `(lat, lon)`, nearest first. Stations
/// without coordinates never match.
pub fn stations_search(stations: &[IsdStation], lat: f64, lon: f64, radius_km: f64) -> Vec<NearbyStation> {
    let mut nearby: Vec<NearbyStation> = stations
        .iter()
        .filter_map(|s| {
            let distance_km = haversine_km(lat, lon, s.latitude?, s.longitude?);
            (distance_km <= radius_km).then(|| NearbyStation {
                station: s.clone(),
                distance_km,
            })
        })
        .collect();
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}

fn date_string(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn stations_to_batch(stations: &[IsdStation]) -> Result<RecordBatch> {
    let fields = vec![
        table::field("usaf", DataType::Utf8, None),
        table::field("wban", DataType::Utf8, None),
        table::field("name", DataType::Utf8, None),
        table::field("country", DataType::Utf8, None),
        table::field("state", DataType::Utf8, None),
        table::field("icao", DataType::Utf8, None),
        table::field("latitude", DataType::Float64, Some("degrees_north")),
        table::field("longitude", DataType::Float64, Some("degrees_east")),
        table::field("elevation", DataType::Float64, Some("m")),
        table::field("begin", DataType::Utf8, None),
        table::field("end", DataType::Utf8, None),
    ];
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(stations.iter().map(|s| s.usaf.as_str()))),
        Arc::new(StringArray::from_iter_values(stations.iter().map(|s| s.wban.as_str()))),
        Arc::new(stations.iter().map(|s| s.name.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.country.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.state.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.icao.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.latitude).collect::<Float64Array>()),
        Arc::new(stations.iter().map(|s| s.longitude).collect::<Float64Array>()),
        Arc::new(stations.iter().map(|s| s.elevation).collect::<Float64Array>()),
        Arc::new(stations.iter().map(|s| date_string(s.begin)).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| date_string(s.end)).collect::<StringArray>()),
    ];

    table::batch(fields, arrays)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const HISTORY: &str = r#""USAF","WBAN","STATION NAME","CTRY","STATE","ICAO","LAT","LON","ELEV(M)","BEGIN","END"
"007018","99999","WXPOD 7018","","","","+00.000","+000.000","+7018.0","20110309","20130730"
"722010","12836","KEY WEST INTERNATIONAL AIRPORT","US","FL","KEYW","+24.557","-081.755","+0001.0","19730101","20240305"
"722015","12850","KEY WEST NAS","US","FL","KNQX","+24.583","-081.683","+0007.0","19730101","20240305"
"722020","12839","MIAMI INTERNATIONAL AIRPORT","US","FL","KMIA","+25.791","-080.316","+0008.8","19730101","20240305"
"999999","00000","NO COORDS","","","","","","","",""
"#;

    #[test]
    fn should_parse_history() {
        let stations = parse_history(HISTORY).unwrap();

        assert_eq!(stations.len(), 5);
        let key_west = &stations[1];
        assert_eq!(key_west.usaf, "722010");
        assert_eq!(key_west.icao, Some("KEYW".to_string()));
        assert_eq!(key_west.latitude, Some(24.557));
        assert_eq!(key_west.longitude, Some(-81.755));
        assert_eq!(key_west.begin, NaiveDate::from_ymd_opt(1973, 1, 1));
        assert_eq!(stations[0].country, None);
        assert_eq!(stations[4].latitude, None);
        assert_eq!(stations[4].begin, None);
    }

    #[test]
    fn should_measure_great_circle_distance() {
        assert!(haversine_km(10.0, 20.0, 10.0, 20.0).abs() < 1e-9);
        // One degree of latitude.
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.01, "{}", d);
    }

    #[test]
    fn should_find_nearest_stations_first() {
        let stations = parse_history(HISTORY).unwrap();

        let nearby = stations_search(&stations, 24.56, -81.76, 20.0);

        assert_eq!(nearby.len(), 2);
        assert_eq!(nearby[0].station.usaf, "722010");
        assert_eq!(nearby[1].station.usaf, "722015");
        assert!(nearby[0].distance_km < nearby[1].distance_km);
    }

    #[test]
    fn should_build_station_batch() {
        let stations = parse_history(HISTORY).unwrap();
        let batch = stations_to_batch(&stations).unwrap();

        assert_eq!(batch.num_rows(), 5);
        assert_eq!(batch.num_columns(), 11);
    }
}
