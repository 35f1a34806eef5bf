//! Integrated Surface Database: hourly observations and station history.
//!
//! Yearly station files live at `<isd>/<year>/<usaf>-<wban>-<year>.gz` and are
//! cached under their own names.

pub mod record;
pub mod stations;

use tracing::info;

pub use record::{to_batch, IsdRecord};
pub use stations::{haversine_km, stations, stations_search, stations_to_batch, IsdStation, NearbyStation};

use crate::{deserialise::parse_lines, download::gunzip_to_string, Error, NoaaClient, Result};

/// Fetches (or reads from cache) and decodes one station-year.
pub async fn isd(client: &NoaaClient, usaf: &str, wban: &str, year: i32, overwrite: bool) -> Result<Vec<IsdRecord>> {
    let (usaf, wban) = (usaf.trim(), wban.trim());
    if usaf.len() != 6 || wban.len() != 5 {
        return Err(Error::query(format!(
            "ISD ids are a 6 character USAF and 5 character WBAN, got {:?} and {:?}",
            usaf, wban
        )));
    }

    let url = format!(
        "{}/{}/{}-{}-{}.gz",
        client.config().endpoints.isd,
        year,
        usaf,
        wban,
        year
    );
    let path = client.cache("isd", overwrite).fetch_named(client.http(), &url).await?;

    let text = tokio::task::spawn_blocking(move || gunzip_to_string(&path))
        .await
        .map_err(|e| Error::decode(format!("gunzip task failed: {}", e)))??;
    let records: Vec<IsdRecord> = parse_lines(&text)?;
    info!(usaf, wban, year, records = records.len(), "decoded ISD file");

    Ok(records)
}

// -- Tests -------------------------------------------------------------------
