//! GHCND `.dly` station-month records.
//!
//! Layout: id (11), year (4), month (2), element (4), then 31 day slots of
//! value (5), mflag (1), qflag (1), sflag (1). See the GHCND readme, section III.

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Int32Builder, StringBuilder},
    datatypes::DataType,
    record_batch::RecordBatch,
};

use crate::{
    deserialise::Record,
    fixed_width::{self, require},
    table, Result,
};

pub const DAYS: usize = 31;
const DAYS_START: usize = 21;
const SLOT_WIDTH: usize = 8;
pub const LINE_WIDTH: usize = DAYS_START + DAYS * SLOT_WIDTH;
const MISSING: i32 = -9999;

/// Columns in the wide table: id, year, month, element and four per day.
pub const WIDE_COLUMNS: usize = 4 + DAYS * 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayValue {
    /// Raw value in the element's native units (e.g. tenths of mm for PRCP).
    pub value: Option<i32>,
    pub mflag: Option<char>,
    pub qflag: Option<char>,
    pub sflag: Option<char>,
}

#[derive(Debug, Clone)]
pub struct DailyReading {
    pub id: String,
    pub year: u16,
    pub month: u8,
    pub element: String,
    pub values: Vec<DayValue>,
}

impl DailyReading {
    pub fn from_line(line: &str) -> Result<Self> {
        let line = require(line, 0, LINE_WIDTH)?;
        if !line.is_ascii() {
            return Err(crate::Error::decode(format!("non-ASCII GHCND line: {:?}", line)));
        }

        let id = line[0..11].to_string();
        let year = parse_number(&line[11..15], line)?;
        let month = parse_number(&line[15..17], line)?;
        let element = line[17..21].trim().to_string();
        let values = parse_day_values(line);

        Ok(DailyReading {
            id,
            year,
            month,
            element,
            values,
        })
    }
}

impl Record for DailyReading {
    fn from_line(line: &str) -> Result<Self> {
        DailyReading::from_line(line)
    }
}

fn parse_number<T: std::str::FromStr>(s: &str, line: &str) -> Result<T> {
    s.trim()
        .parse()
        .map_err(|_| crate::Error::decode(format!("bad number {:?} in GHCND line {:?}", s, &line[..21])))
}

fn parse_day_values(line: &str) -> Vec<DayValue> {
    (0..DAYS)
        .map(|i| {
            let start = DAYS_START + i * SLOT_WIDTH;
            let slot = &line[start..start + SLOT_WIDTH];
            DayValue {
                value: fixed_width::int(&slot[..5], MISSING),
                mflag: fixed_width::flag(&slot[5..6]),
                qflag: fixed_width::flag(&slot[6..7]),
                sflag: fixed_width::flag(&slot[7..8]),
            }
        })
        .collect()
}

/// Decodes a whole `.dly` file.
pub fn parse_dly(text: &str) -> Result<Vec<DailyReading>> {
    crate::deserialise::parse_lines(text)
}

/// One row per station-month: `id, year, month, element`, then
/// `VALUEn, MFLAGn, QFLAGn, SFLAGn` for every day `n` in 1..=31.
pub fn to_wide_batch(readings: &[DailyReading]) -> Result<RecordBatch> {
    let rows = readings.len();
    let mut id_builder = StringBuilder::with_capacity(rows, rows * 11);
    let mut year_builder = Int32Builder::with_capacity(rows);
    let mut month_builder = Int32Builder::with_capacity(rows);
    let mut element_builder = StringBuilder::with_capacity(rows, rows * 4);
    let mut value_builders: Vec<Int32Builder> =
        (0..DAYS).map(|_| Int32Builder::with_capacity(rows)).collect();
    let mut flag_builders: Vec<[StringBuilder; 3]> = (0..DAYS)
        .map(|_| {
            [
                StringBuilder::with_capacity(rows, rows),
                StringBuilder::with_capacity(rows, rows),
                StringBuilder::with_capacity(rows, rows),
            ]
        })
        .collect();

    for reading in readings {
        id_builder.append_value(&reading.id);
        year_builder.append_value(reading.year as i32);
        month_builder.append_value(reading.month as i32);
        element_builder.append_value(&reading.element);

        for day in 0..DAYS {
            let slot = reading.values.get(day).cloned().unwrap_or_default();
            value_builders[day].append_option(slot.value);
            let [m, q, s] = &mut flag_builders[day];
            m.append_option(slot.mflag.map(String::from));
            q.append_option(slot.qflag.map(String::from));
            s.append_option(slot.sflag.map(String::from));
        }
    }

    let mut fields = vec![
        table::field("id", DataType::Utf8, None),
        table::field("year", DataType::Int32, None),
        table::field("month", DataType::Int32, None),
        table::field("element", DataType::Utf8, None),
    ];
    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(id_builder.finish()),
        Arc::new(year_builder.finish()),
        Arc::new(month_builder.finish()),
        Arc::new(element_builder.finish()),
    ];

    for (day, (value_builder, flags)) in value_builders
        .iter_mut()
        .zip(flag_builders.iter_mut())
        .enumerate()
    {
        let n = day + 1;
        fields.push(table::field(&format!("VALUE{}", n), DataType::Int32, None));
        arrays.push(Arc::new(value_builder.finish()));
        for (prefix, builder) in ["MFLAG", "QFLAG", "SFLAG"].iter().zip(flags.iter_mut()) {
            fields.push(table::field(&format!("{}{}", prefix, n), DataType::Utf8, None));
            arrays.push(Arc::new(builder.finish()));
        }
    }

    table::batch(fields, arrays)
}

// -- Tests -------------------------------------------------------------------
