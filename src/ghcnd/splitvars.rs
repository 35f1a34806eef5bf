//! Reshapes station-month records into long form, one row per station and date.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, Date32Builder, Float32Builder, Int32Builder, StringBuilder},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use chrono::NaiveDate;

use super::DailyReading;
use crate::{table, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: String,
    pub date: NaiveDate,
    pub value: Option<i32>,
    pub mflag: Option<char>,
    pub qflag: Option<char>,
    pub sflag: Option<char>,
}

/// Groups observations by lowercase element code. Day slots that are not
/// calendar dates (Feb 30 and friends) are dropped.
pub fn split_vars(readings: &[DailyReading]) -> BTreeMap<String, Vec<Observation>> {
    let mut by_element: BTreeMap<String, Vec<Observation>> = BTreeMap::new();

    for reading in readings {
        let observations = by_element
            .entry(reading.element.to_lowercase())
            .or_default();

        for (day_index, slot) in reading.values.iter().enumerate() {
            let day = (day_index + 1) as u32;
            if let Some(date) = NaiveDate::from_ymd_opt(reading.year as i32, reading.month as u32, day) {
                observations.push(Observation {
                    id: reading.id.clone(),
                    date,
                    value: slot.value,
                    mflag: slot.mflag,
                    qflag: slot.qflag,
                    sflag: slot.sflag,
                });
            }
        }
    }

    for observations in by_element.values_mut() {
        observations.sort_by(|a, b| a.id.cmp(&b.id).then(a.date.cmp(&b.date)));
    }

    by_element
}

/// Columns `id, date, <element>, mflag, qflag, sflag`.
pub fn observations_to_batch(element: &str, observations: &[Observation]) -> Result<RecordBatch> {
    let rows = observations.len();
    let mut id_builder = StringBuilder::with_capacity(rows, rows * 11);
    let mut date_builder = Date32Builder::with_capacity(rows);
    let mut value_builder = Int32Builder::with_capacity(rows);
    let mut mflag_builder = StringBuilder::with_capacity(rows, rows);
    let mut qflag_builder = StringBuilder::with_capacity(rows, rows);
    let mut sflag_builder = StringBuilder::with_capacity(rows, rows);

    for obs in observations {
        id_builder.append_value(&obs.id);
        date_builder.append_value(date32(obs.date));
        value_builder.append_option(obs.value);
        mflag_builder.append_option(obs.mflag.map(String::from));
        qflag_builder.append_option(obs.qflag.map(String::from));
        sflag_builder.append_option(obs.sflag.map(String::from));
    }

    let fields = vec![
        table::field("id", DataType::Utf8, None),
        table::field("date", DataType::Date32, None),
        table::field(&element.to_lowercase(), DataType::Int32, None),
        table::field("mflag", DataType::Utf8, None),
        table::field("qflag", DataType::Utf8, None),
        table::field("sflag", DataType::Utf8, None),
    ];
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(id_builder.finish()),
        Arc::new(date_builder.finish()),
        Arc::new(value_builder.finish()),
        Arc::new(mflag_builder.finish()),
        Arc::new(qflag_builder.finish()),
        Arc::new(sflag_builder.finish()),
    ];

    table::batch(fields, arrays)
}

/// `split_vars` with every element group turned into a table.
pub fn split_vars_tables(readings: &[DailyReading]) -> Result<BTreeMap<String, RecordBatch>> {
    split_vars(readings)
        .into_iter()
        .map(|(element, observations)| {
            let batch = observations_to_batch(&element, &observations)?;
            Ok((element, batch))
        })
        .collect()
}

/// All elements in one long table with station coordinates attached:
/// `id, date, element, value, mflag, qflag, sflag, lat, lon`. Missing values
/// are left out.
pub fn to_long_batch(
    readings: &[DailyReading],
    coords: &HashMap<String, (f32, f32)>,
) -> Result<RecordBatch> {
    let mut id_builder = StringBuilder::new();
    let mut date_builder = Date32Builder::new();
    let mut element_builder = StringBuilder::new();
    let mut value_builder = Int32Builder::new();
    let mut mflag_builder = StringBuilder::new();
    let mut qflag_builder = StringBuilder::new();
    let mut sflag_builder = StringBuilder::new();
    let mut lat_builder = Float32Builder::new();
    let mut lon_builder = Float32Builder::new();

    for reading in readings {
        let coord = coords.get(&reading.id);
        for (day_index, slot) in reading.values.iter().enumerate() {
            let Some(value) = slot.value else {
                continue;
            };
            let day = (day_index + 1) as u32;
            let Some(date) = NaiveDate::from_ymd_opt(reading.year as i32, reading.month as u32, day) else {
                continue;
            };

            id_builder.append_value(&reading.id);
            date_builder.append_value(date32(date));
            element_builder.append_value(&reading.element);
            value_builder.append_value(value);
            mflag_builder.append_option(slot.mflag.map(String::from));
            qflag_builder.append_option(slot.qflag.map(String::from));
            sflag_builder.append_option(slot.sflag.map(String::from));
            lat_builder.append_option(coord.map(|c| c.0));
            lon_builder.append_option(coord.map(|c| c.1));
        }
    }

    let fields = vec![
        table::field("id", DataType::Utf8, None),
        table::field("date", DataType::Date32, None),
        table::field("element", DataType::Utf8, None),
        table::field("value", DataType::Int32, None),
        table::field("mflag", DataType::Utf8, None),
        table::field("qflag", DataType::Utf8, None),
        table::field("sflag", DataType::Utf8, None),
        table::field("lat", DataType::Float32, Some("degrees_north")),
        table::field("lon", DataType::Float32, Some("degrees_east")),
    ];
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(id_builder.finish()),
        Arc::new(date_builder.finish()),
        Arc::new(element_builder.finish()),
        Arc::new(value_builder.finish()),
        Arc::new(mflag_builder.finish()),
        Arc::new(qflag_builder.finish()),
        Arc::new(sflag_builder.finish()),
        Arc::new(lat_builder.finish()),
        Arc::new(lon_builder.finish()),
    ];

    table::batch(fields, arrays)
}

/// Days since the Unix epoch. `NaiveDate::default()` is 1970-01-01.
fn date32(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use arrow::array::{Array, Date32Array, Float32Array, Int32Array};

    use super::*;
    use crate::ghcnd::daily::{parse_dly, test::line};

    fn readings() -> Vec<DailyReading> {
        let text = [
            line("USW00014895", 2020, 2, "TMAX"),
            line("USW00014895", 2020, 2, "PRCP"),
            line("USW00014895", 2020, 1, "PRCP"),
            line("USW00014895", 2020, 3, "SNOW"),
        ]
        .join("\n");
        parse_dly(&text).unwrap()
    }

    #[test]
    fn should_make_one_table_per_element() {
        let tables = split_vars_tables(&readings()).unwrap();

        let keys: Vec<&str> = tables.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["prcp", "snow", "tmax"]);
    }

    #[test]
    fn should_drop_impossible_dates() {
        let groups = split_vars(&readings());

        // 2020 is a leap year: February has 29 real days, January 31.
        assert_eq!(groups["tmax"].len(), 29);
        assert_eq!(groups["prcp"].len(), 31 + 29);
        assert_eq!(groups["snow"].len(), 31);
    }

    #[test]
    fn should_sort_by_date() {
        let groups = split_vars(&readings());
        let prcp = &groups["prcp"];

        assert_eq!(prcp[0].date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(prcp[31].date, NaiveDate::from_ymd_opt(2020, 2, 1).unwrap());
        assert_eq!(prcp[31].value, Some(10));
        assert_eq!(prcp[31].qflag, Some('Q'));
    }

    #[test]
    fn should_name_value_column_after_element() {
        let tables = split_vars_tables(&readings()).unwrap();
        let tmax = &tables["tmax"];
        let schema = tmax.schema();

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "date", "tmax", "mflag", "qflag", "sflag"]);

        let dates = tmax.column(1).as_any().downcast_ref::<Date32Array>().unwrap();
        let first = NaiveDate::from_ymd_opt(2020, 2, 1).unwrap();
        assert_eq!(dates.value(0), (first - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32);

        let values = tmax.column(2).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(values.value(28), 290);
    }

    #[test]
    fn should_attach_coordinates_in_long_table() {
        let mut coords = HashMap::new();
        coords.insert("USW00014895".to_string(), (41.0, -81.4));

        let mut readings = readings();
        readings[0].values[0].value = None;
        let batch = to_long_batch(&readings, &coords).unwrap();

        assert_eq!(batch.num_rows(), 28 + 31 + 29 + 31);
        let lat = batch.column_by_name("lat").unwrap().as_any().downcast_ref::<Float32Array>().unwrap();
        assert_eq!(lat.value(0), 41.0);
        assert!(!lat.is_null(0));
    }
}
