//! Global Historical Climatology Network - Daily.
//!
//! Station files are fetched from the NCEI file tree, cached under
//! `<cache>/ghcnd/<station>.dly` and decoded from the fixed-width layout.

pub mod archive;
pub mod daily;
pub mod splitvars;
pub mod stations;

use std::{collections::BTreeMap, fs};

use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use tracing::warn;

pub use daily::{parse_dly, to_wide_batch, DailyReading, DayValue};
pub use splitvars::{observations_to_batch, split_vars, split_vars_tables, Observation};
pub use stations::{CodeName, InventoryEntry, Station};

use crate::{Error, NoaaClient, Result};

/// Fetches (or reads from cache) and decodes all records for one station.
pub async fn ghcnd(client: &NoaaClient, station_id: &str, refresh: bool) -> Result<Vec<DailyReading>> {
    let station_id = station_id.trim();
    if station_id.len() != 11 {
        return Err(Error::query(format!(
            "GHCND station ids are 11 characters, got {:?}",
            station_id
        )));
    }

    let url = format!("{}/all/{}.dly", client.config().endpoints.ghcnd, station_id);
    let path = client.cache("ghcnd", refresh).fetch_named(client.http(), &url).await?;

    parse_dly(&fs::read_to_string(path)?)
}

/// Filters applied by [`search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Element codes (case-insensitive). Empty means every element.
    pub elements: Vec<String>,
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
    pub refresh: bool,
}

/// One long-form table per element for `station_id`, restricted to the
/// requested elements and date range.
pub async fn search(
    client: &NoaaClient,
    station_id: &str,
    options: &SearchOptions,
) -> Result<BTreeMap<String, RecordBatch>> {
    if let (Some(min), Some(max)) = (options.date_min, options.date_max) {
        if min > max {
            return Err(Error::query(format!("date_min {} is after date_max {}", min, max)));
        }
    }

    let readings = ghcnd(client, station_id, options.refresh).await?;
    filter_groups(split_vars(&readings), options)
        .into_iter()
        .map(|(element, observations)| {
            let batch = observations_to_batch(&element, &observations)?;
            Ok((element, batch))
        })
        .collect()
}

fn filter_groups(
    mut groups: BTreeMap<String, Vec<Observation>>,
    options: &SearchOptions,
) -> BTreeMap<String, Vec<Observation>> {
    if !options.elements.is_empty() {
        let wanted: Vec<String> = options.elements.iter().map(|e| e.to_lowercase()).collect();
        for element in &wanted {
            if !groups.contains_key(element) {
                warn!(%element, "element not present for station");
            }
        }
        groups.retain(|element, _| wanted.contains(element));
    }

    for observations in groups.values_mut() {
        observations.retain(|obs| {
            options.date_min.map_or(true, |min| obs.date >= min)
                && options.date_max.map_or(true, |max| obs.date <= max)
        });
    }

    groups
}

// -- Tests -------------------------------------------------------------------
