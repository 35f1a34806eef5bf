//! Mandatory data section of an ISD record.
//!
//! Every line starts with 105 fixed-width characters (control and mandatory
//! sections). Whatever follows, the additional and remarks sections, is kept
//! verbatim.

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Float64Array, Int32Array, StringArray, TimestampSecondArray},
    datatypes::{DataType, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::NaiveDateTime;

use crate::{
    deserialise::Record,
    fixed_width::{flag, int, lenient, require, text},
    table, Error, Result,
};

pub const MANDATORY_WIDTH: usize = 105;

#[derive(Debug, Clone, PartialEq)]
pub struct IsdRecord {
    pub usaf: String,
    pub wban: String,
    pub datetime: NaiveDateTime,
    pub source: Option<char>,
    /// Degrees, scaled from thousandths.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub report_type: Option<String>,
    /// Metres.
    pub elevation: Option<f64>,
    pub call_letters: Option<String>,
    pub qc_process: Option<String>,
    /// Degrees from true north.
    pub wind_direction: Option<i32>,
    pub wind_direction_quality: Option<char>,
    pub wind_type: Option<char>,
    /// m/s, scaled from tenths.
    pub wind_speed: Option<f64>,
    pub wind_speed_quality: Option<char>,
    /// Metres.
    pub ceiling_height: Option<i32>,
    pub ceiling_quality: Option<char>,
    pub ceiling_determination: Option<char>,
    pub cavok: Option<char>,
    /// Metres.
    pub visibility: Option<i32>,
    pub visibility_quality: Option<char>,
    pub visibility_variability: Option<char>,
    pub visibility_variability_quality: Option<char>,
    /// Degrees Celsius, scaled from tenths.
    pub temperature: Option<f64>,
    pub temperature_quality: Option<char>,
    pub dew_point: Option<f64>,
    pub dew_point_quality: Option<char>,
    /// Hectopascals, scaled from tenths.
    pub sea_level_pressure: Option<f64>,
    pub sea_level_pressure_quality: Option<char>,
    /// Additional and remarks sections, undecoded.
    pub additional: Option<String>,
}

fn scaled(s: &str, missing: i32, scale: f64) -> Option<f64> {
    int(s, missing).map(|v| f64::from(v) / scale)
}

impl Record for IsdRecord {
    fn from_line(line: &str) -> Result<Self> {
        let head = require(line, 0, MANDATORY_WIDTH)?;
        if !head.is_ascii() {
            return Err(Error::decode(format!("non-ASCII ISD mandatory section: {:?}", head)));
        }
        let stamp = &line[15..27];
        let datetime = NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M")
            .map_err(|_| Error::decode(format!("bad ISD date/time {:?}", stamp)))?;
        let field = |start: usize, end: usize| &line[start..end];
        let char_at = |i: usize| flag(&line[i..i + 1]);

        Ok(IsdRecord {
            usaf: field(4, 10).to_string(),
            wban: field(10, 15).to_string(),
            datetime,
            source: char_at(27).filter(|&c| c != '9'),
            latitude: scaled(field(28, 34), 99999, 1000.0),
            longitude: scaled(field(34, 41), 999999, 1000.0),
            report_type: text(field(41, 46)).filter(|s| s != "99999"),
            elevation: int(field(46, 51), 9999).map(f64::from),
            call_letters: text(field(51, 56)).filter(|s| s != "99999"),
            qc_process: text(field(56, 60)),
            wind_direction: int(field(60, 63), 999),
            wind_direction_quality: char_at(63),
            wind_type: char_at(64).filter(|&c| c != '9'),
            wind_speed: scaled(field(65, 69), 9999, 10.0),
            wind_speed_quality: char_at(69),
            ceiling_height: int(field(70, 75), 99999),
            ceiling_quality: char_at(75),
            ceiling_determination: char_at(76).filter(|&c| c != '9'),
            cavok: char_at(77).filter(|&c| c != '9'),
            visibility: int(field(78, 84), 999999),
            visibility_quality: char_at(84),
            visibility_variability: char_at(85).filter(|&c| c != '9'),
            visibility_variability_quality: char_at(86),
            temperature: scaled(field(87, 92), 9999, 10.0),
            temperature_quality: char_at(92),
            dew_point: scaled(field(93, 98), 9999, 10.0),
            dew_point_quality: char_at(98),
            sea_level_pressure: scaled(field(99, 104), 99999, 10.0),
            sea_level_pressure_quality: char_at(104),
            additional: text(lenient(line, MANDATORY_WIDTH, line.len())),
        })
    }
}

fn flags(values: impl Iterator<Item = Option<char>>) -> StringArray {
    values.map(|c| c.map(String::from)).collect()
}

pub fn to_batch(records: &[IsdRecord]) -> Result<RecordBatch> {
    let utc = || DataType::Timestamp(TimeUnit::Second, Some("UTC".into()));
    let fields = vec![
        table::field("usaf", DataType::Utf8, None),
        table::field("wban", DataType::Utf8, None),
        table::field("datetime", utc(), None),
        table::field("source", DataType::Utf8, None),
        table::field("latitude", DataType::Float64, Some("degrees_north")),
        table::field("longitude", DataType::Float64, Some("degrees_east")),
        table::field("report_type", DataType::Utf8, None),
        table::field("elevation", DataType::Float64, Some("m")),
        table::field("call_letters", DataType::Utf8, None),
        table::field("qc_process", DataType::Utf8, None),
        table::field("wind_direction", DataType::Int32, Some("degrees")),
        table::field("wind_direction_quality", DataType::Utf8, None),
        table::field("wind_type", DataType::Utf8, None),
        table::field("wind_speed", DataType::Float64, Some("m s-1")),
        table::field("wind_speed_quality", DataType::Utf8, None),
        table::field("ceiling_height", DataType::Int32, Some("m")),
        table::field("ceiling_quality", DataType::Utf8, None),
        table::field("ceiling_determination", DataType::Utf8, None),
        table::field("cavok", DataType::Utf8, None),
        table::field("visibility", DataType::Int32, Some("m")),
        table::field("visibility_quality", DataType::Utf8, None),
        table::field("visibility_variability", DataType::Utf8, None),
        table::field("visibility_variability_quality", DataType::Utf8, None),
        table::field("temperature", DataType::Float64, Some("degree_C")),
        table::field("temperature_quality", DataType::Utf8, None),
        table::field("dew_point", DataType::Float64, Some("degree_C")),
        table::field("dew_point_quality", DataType::Utf8, None),
        table::field("sea_level_pressure", DataType::Float64, Some("hPa")),
        table::field("sea_level_pressure_quality", DataType::Utf8, None),
        table::field("additional", DataType::Utf8, None),
    ];

    let r = records;
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(r.iter().map(|x| x.usaf.as_str()))),
        Arc::new(StringArray::from_iter_values(r.iter().map(|x| x.wban.as_str()))),
        Arc::new(
            TimestampSecondArray::from_iter_values(r.iter().map(|x| x.datetime.and_utc().timestamp()))
                .with_timezone("UTC"),
        ),
        Arc::new(flags(r.iter().map(|x| x.source))),
        Arc::new(r.iter().map(|x| x.latitude).collect::<Float64Array>()),
        Arc::new(r.iter().map(|x| x.longitude).collect::<Float64Array>()),
        Arc::new(r.iter().map(|x| x.report_type.as_deref()).collect::<StringArray>()),
        Arc::new(r.iter().map(|x| x.elevation).collect::<Float64Array>()),
        Arc::new(r.iter().map(|x| x.call_letters.as_deref()).collect::<StringArray>()),
        Arc::new(r.iter().map(|x| x.qc_process.as_deref()).collect::<StringArray>()),
        Arc::new(r.iter().map(|x| x.wind_direction).collect::<Int32Array>()),
        Arc::new(flags(r.iter().map(|x| x.wind_direction_quality))),
        Arc::new(flags(r.iter().map(|x| x.wind_type))),
        Arc::new(r.iter().map(|x| x.wind_speed).collect::<Float64Array>()),
        Arc::new(flags(r.iter().map(|x| x.wind_speed_quality))),
        Arc::new(r.iter().map(|x| x.ceiling_height).collect::<Int32Array>()),
        Arc::new(flags(r.iter().map(|x| x.ceiling_quality))),
        Arc::new(flags(r.iter().map(|x| x.ceiling_determination))),
        Arc::new(flags(r.iter().map(|x| x.cavok))),
        Arc::new(r.iter().map(|x| x.visibility).collect::<Int32Array>()),
        Arc::new(flags(r.iter().map(|x| x.visibility_quality))),
        Arc::new(flags(r.iter().map(|x| x.visibility_variability))),
        Arc::new(flags(r.iter().map(|x| x.visibility_variability_quality))),
        Arc::new(r.iter().map(|x| x.temperature).collect::<Float64Array>()),
        Arc::new(flags(r.iter().map(|x| x.temperature_quality))),
        Arc::new(r.iter().map(|x| x.dew_point).collect::<Float64Array>()),
        Arc::new(flags(r.iter().map(|x| x.dew_point_quality))),
        Arc::new(r.iter().map(|x| x.sea_level_pressure).collect::<Float64Array>()),
        Arc::new(flags(r.iter().map(|x| x.sea_level_pressure_quality))),
        Arc::new(r.iter().map(|x| x.additional.as_deref()).collect::<StringArray>()),
    ];

    table::batch(fields, arrays)
}

// -- Tests -------------------------------------------------------------------
