//! NDBC buoy station list and historical data files.

use std::{fmt, fs, str::FromStr, sync::Arc};

use arrow::{
    array::{ArrayRef, BooleanArray, Float64Array, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use quick_xml::{events::Event, Reader};
use tracing::{debug, info};

use crate::{
    download::gunzip_to_string,
    table::{self, build_inferred, Column, Row},
    Error, NoaaClient, Result,
};

const MISSING: &str = "MM";
const TIME_COLUMNS: [&str; 6] = ["YY", "YYYY", "MM", "DD", "hh", "mm"];
const DIRECTION_COLUMNS: [&str; 5] = ["WDIR", "WD", "MWD", "DIR", "GDR"];
const PRESSURE_COLUMNS: [&str; 2] = ["PRES", "BAR"];

/// Historical data sets published per station and year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuoyDataset {
    /// Standard meteorological data.
    Stdmet,
    /// Continuous winds.
    Cwind,
    /// Oceanographic data.
    Ocean,
    /// Spectral wave density.
    Swden,
    /// Solar radiation.
    Srad,
}

impl BuoyDataset {
    pub const ALL: [BuoyDataset; 5] = [
        BuoyDataset::Stdmet,
        BuoyDataset::Cwind,
        BuoyDataset::Ocean,
        BuoyDataset::Swden,
        BuoyDataset::Srad,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuoyDataset::Stdmet => "stdmet",
            BuoyDataset::Cwind => "cwind",
            BuoyDataset::Ocean => "ocean",
            BuoyDataset::Swden => "swden",
            BuoyDataset::Srad => "srad",
        }
    }

    /// Letter between station id and year in the file name.
    pub fn letter(&self) -> char {
        match self {
            BuoyDataset::Stdmet => 'h',
            BuoyDataset::Cwind => 'c',
            BuoyDataset::Ocean => 'o',
            BuoyDataset::Swden => 'w',
            BuoyDataset::Srad => 'r',
        }
    }

    pub fn file_name(&self, station: &str, year: i32) -> String {
        format!("{}{}{}.txt.gz", station.to_lowercase(), self.letter(), year)
    }
}

impl fmt::Display for BuoyDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BuoyDataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BuoyDataset::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::query(format!("unknown buoy dataset {:?}", s)))
    }
}

fn is_sentinel(column: &str, value: f64) -> bool {
    if DIRECTION_COLUMNS.contains(&column) {
        value == 999.0
    } else if PRESSURE_COLUMNS.contains(&column) {
        value == 9999.0
    } else {
        value == 99.0 || value == 999.0 || value == 9999.0
    }
}

fn cell(column: &str, token: &str) -> Option<String> {
    if token == MISSING {
        return None;
    }
    if !TIME_COLUMNS.contains(&column) {
        if let Ok(value) = token.parse::<f64>() {
            if is_sentinel(column, value) {
                return None;
            }
        }
    }
    Some(token.to_string())
}

/// Decodes a whitespace-delimited NDBC historical file. The first line names
/// the columns, optionally behind `#`. A following `#` line holds units.
pub fn parse_buoy(text: &str) -> Result<RecordBatch> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty()).peekable();

    let header = lines
        .next()
        .ok_or_else(|| Error::decode("empty buoy data file"))?;
    let names: Vec<&str> = header.trim_start_matches('#').split_whitespace().collect();

    let units: Option<Vec<&str>> = match lines.peek().copied() {
        Some(line) if line.trim_start().starts_with('#') => {
            let units = line.trim_start().trim_start_matches('#').split_whitespace().collect();
            lines.next();
            Some(units)
        }
        _ => None,
    };

    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let unit = units.as_ref().and_then(|u| u.get(i)).map(|u| u.to_string());
            Column::with_units(*name, unit)
        })
        .collect();

    let mut rows: Vec<Row> = Vec::new();
    for (n, line) in lines.enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != names.len() {
            return Err(Error::decode(format!(
                "buoy data line {} has {} values, expected {}",
                n + 1,
                tokens.len(),
                names.len()
            )));
        }
        rows.push(
            names
                .iter()
                .zip(tokens)
                .map(|(name, token)| cell(name, token))
                .collect(),
        );
    }

    build_inferred(&columns, &rows)
}

/// One station-year of `dataset` for `station`, cached by file name.
pub async fn buoy(
    client: &NoaaClient,
    dataset: BuoyDataset,
    station: &str,
    year: i32,
    overwrite: bool,
) -> Result<RecordBatch> {
    let url = format!(
        "{}/data/historical/{}/{}",
        client.config().endpoints.ndbc,
        dataset,
        dataset.file_name(station.trim(), year)
    );
    let path = client.cache("buoy", overwrite).fetch_named(client.http(), &url).await?;

    let text = tokio::task::spawn_blocking(move || gunzip_to_string(&path))
        .await
        .map_err(|e| Error::decode(format!("gunzip task failed: {}", e)))??;
    let table = parse_buoy(&text)?;
    info!(%dataset, station, year, rows = table.num_rows(), "decoded buoy file");

    Ok(table)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuoyStation {
    pub id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub program: Option<String>,
    /// Platform type, e.g. `buoy`, `fixed` or `dart`.
    pub kind: Option<String>,
    pub met: bool,
    pub currents: bool,
    pub water_quality: bool,
    pub dart: bool,
}

/// Reads every `<station>` element of `activestations.xml`.
pub fn parse_active_stations(xml: &str) -> Result<Vec<BuoyStation>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut stations = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"station" => {
                let mut station = BuoyStation::default();
                for attr in e.attributes() {
                    let attr = attr?;
                    let value = attr.unescape_value()?.trim().to_string();
                    let text = || Some(value.clone()).filter(|v| !v.is_empty());
                    let yes = value.eq_ignore_ascii_case("y");
                    match attr.key.as_ref() {
                        b"id" => station.id = value.to_uppercase(),
                        b"lat" => station.latitude = value.parse().ok(),
                        b"lon" => station.longitude = value.parse().ok(),
                        b"elev" => station.elevation = value.parse().ok(),
                        b"name" => station.name = text(),
                        b"owner" => station.owner = text(),
                        b"pgm" => station.program = text(),
                        b"type" => station.kind = text(),
                        b"met" => station.met = yes,
                        b"currents" => station.currents = yes,
                        b"waterquality" => station.water_quality = yes,
                        b"dart" => station.dart = yes,
                        _ => {}
                    }
                }
                stations.push(station);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    debug!(stations = stations.len(), "parsed active station list");

    Ok(stations)
}

/// Active NDBC stations.
pub async fn stations(client: &NoaaClient, refresh: bool) -> Result<Vec<BuoyStation>> {
    let url = format!("{}/activestations.xml", client.config().endpoints.ndbc);
    let path = client.cache("buoy", refresh).fetch_named(client.http(), &url).await?;
    parse_active_stations(&fs::read_to_string(path)?)
}

pub fn stations_to_batch(stations: &[BuoyStation]) -> Result<RecordBatch> {
    let fields = vec![
        table::field("id", DataType::Utf8, None),
        table::field("latitude", DataType::Float64, Some("degrees_north")),
        table::field("longitude", DataType::Float64, Some("degrees_east")),
        table::field("elevation", DataType::Float64, Some("m")),
        table::field("name", DataType::Utf8, None),
        table::field("owner", DataType::Utf8, None),
        table::field("program", DataType::Utf8, None),
        table::field("type", DataType::Utf8, None),
        table::field("met", DataType::Boolean, None),
        table::field("currents", DataType::Boolean, None),
        table::field("water_quality", DataType::Boolean, None),
        table::field("dart", DataType::Boolean, None),
    ];
    let bools = |f: fn(&BuoyStation) -> bool| -> ArrayRef {
        Arc::new(stations.iter().map(|s| Some(f(s))).collect::<BooleanArray>())
    };
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(stations.iter().map(|s| s.id.as_str()))),
        Arc::new(stations.iter().map(|s| s.latitude).collect::<Float64Array>()),
        Arc::new(stations.iter().map(|s| s.longitude).collect::<Float64Array>()),
        Arc::new(stations.iter().map(|s| s.elevation).collect::<Float64Array>()),
        Arc::new(stations.iter().map(|s| s.name.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.owner.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.program.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.kind.as_deref()).collect::<StringArray>()),
        bools(|s| s.met),
        bools(|s| s.currents),
        bools(|s| s.water_quality),
        bools(|s| s.dart),
    ];

    table::batch(fields, arrays)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        table::{f64_value, units},
        test_support::{serve, test_client, Route},
    };

    const STDMET: &str = "#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS  TIDE
#yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi    ft
2020 01 01 00 00  99  7.2  8.9  1.45  7.69  5.43 104 1018.2  22.4  23.9  18.1 99.0 99.00
2020 01 01 00 10 999 99.0 99.0 99.00 99.00 99.00 999 9999.0 999.0 999.0 999.0 99.0 99.00
2020 01 01 00 20  MM  7.0   MM    MM    MM    MM  MM 1018.1  22.3    MM    MM   MM    MM
";

    const LEGACY_STDMET: &str = "YYYY MM DD hh  WD  WSPD GST  WVHT  DPD   APD  MWD  BAR    ATMP  WTMP  DEWP  VIS
1995 01 01 00 210  5.1  6.3  1.10  8.33  5.90 999 1017.6  20.5  22.9 999.0 99.0
";

    const ACTIVE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<stations created="2024-03-05T15:05:01UTC" count="2">
  <station id="41001" lat="34.724" lon="-72.317" name="EAST HATTERAS - 150 NM East of Cape Hatteras" owner="NDBC" pgm="NDBC Meteorological/Ocean" type="buoy" met="y" currents="n" waterquality="n" dart="n"/>
  <station id="0y2w3" lat="44.794" lon="-87.313" elev="179" name="Sturgeon Bay CG Station, WI" owner="U.S.C.G. Marine Weather Dissemination Program" pgm="IOOS Partners" type="fixed" met="y" currents="n" waterquality="n" dart="n"/>
</stations>"#;

    #[test]
    fn should_build_file_names() {
        assert_eq!(BuoyDataset::Stdmet.file_name("41001", 2020), "41001h2020.txt.gz");
        assert_eq!(BuoyDataset::Swden.file_name("TPLM2", 2019), "tplm2w2019.txt.gz");
        assert_eq!("ocean".parse::<BuoyDataset>().unwrap(), BuoyDataset::Ocean);
        assert!("waves".parse::<BuoyDataset>().is_err());
    }

    #[test]
    fn should_decode_stdmet_with_units() {
        let table = parse_buoy(STDMET).unwrap();

        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.num_columns(), 18);
        assert_eq!(table.schema().field(0).name(), "YY");
        assert_eq!(units(&table, "PRES"), Some("hPa"));
        // 99 degrees is a real wind direction.
        assert_eq!(f64_value(&table, "WDIR", 0), Some(99.0));
        assert_eq!(f64_value(&table, "PRES", 0), Some(1018.2));
        assert_eq!(f64_value(&table, "VIS", 0), None);
    }

    #[test]
    fn should_null_sentinels_and_mm() {
        let table = parse_buoy(STDMET).unwrap();

        for column in ["WDIR", "WSPD", "WVHT", "MWD", "PRES", "ATMP", "DEWP", "TIDE"] {
            assert_eq!(f64_value(&table, column, 1), None, "{}", column);
        }
        assert_eq!(f64_value(&table, "WDIR", 2), None);
        assert_eq!(f64_value(&table, "WSPD", 2), Some(7.0));
        assert_eq!(f64_value(&table, "mm", 1), Some(10.0));
    }

    #[test]
    fn should_decode_headers_without_units_line() {
        let table = parse_buoy(LEGACY_STDMET).unwrap();

        assert_eq!(table.num_rows(), 1);
        assert_eq!(f64_value(&table, "WD", 0), Some(210.0));
        assert_eq!(f64_value(&table, "MWD", 0), None);
        assert_eq!(units(&table, "BAR"), None);
    }

    #[test]
    fn should_reject_ragged_rows() {
        let text = "#YY MM DD\n2020 01\n";
        assert!(parse_buoy(text).is_err());
    }

    #[test]
    fn should_parse_active_stations() {
        let stations = parse_active_stations(ACTIVE).unwrap();

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id, "41001");
        assert_eq!(stations[0].kind, Some("buoy".to_string()));
        assert_eq!(stations[0].elevation, None);
        assert!(stations[0].met);
        assert!(!stations[0].dart);
        assert_eq!(stations[1].id, "0Y2W3");
        assert_eq!(stations[1].elevation, Some(179.0));
        assert_eq!(stations[1].latitude, Some(44.794));

        let batch = stations_to_batch(&stations).unwrap();
        assert_eq!(batch.num_columns(), 12);
    }

    #[tokio::test]
    async fn should_fetch_historical_file() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(STDMET.as_bytes()).unwrap();
        let server = serve(vec![Route::ok(
            "/ndbc/data/historical/stdmet/41001h2020.txt.gz",
            encoder.finish().unwrap(),
        )])
        .await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());

        let table = buoy(&client, BuoyDataset::Stdmet, "41001", 2020, false).await.unwrap();

        assert_eq!(table.num_rows(), 3);
        assert!(dir.path().join("buoy").join("41001h2020.txt.gz").is_file());
    }
}
