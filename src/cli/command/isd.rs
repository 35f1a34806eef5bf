use anyhow::Result;
use noaadata::isd::{self, stations_search, stations_to_batch, to_batch};

use super::Context;
use crate::cli::create_spinner;

pub async fn isd(ctx: &Context, usaf: &str, wban: &str, year: i32) -> Result<String> {
    let bar = create_spinner(format!("Fetching {}-{} for {}...", usaf, wban, year));
    let records = isd::isd(&ctx.client, usaf, wban, year, ctx.refresh).await?;
    bar.finish_with_message(format!("{} observations decoded", records.len()));

    let path = ctx.save(&to_batch(&records)?, &format!("isd-{}-{}-{}", usaf, wban, year))?;
    Ok(format!("File saved to `{}`", path))
}

pub async fn stations(ctx: &Context, lat: Option<f64>, lon: Option<f64>, radius_km: f64) -> Result<String> {
    let bar = create_spinner("Fetching ISD station history...".to_string());
    let mut stations = isd::stations(&ctx.client, ctx.refresh).await?;
    bar.finish_with_message(format!("{} stations", stations.len()));

    let stem = match (lat, lon) {
        (Some(lat), Some(lon)) => {
            stations = stations_search(&stations, lat, lon, radius_km)
                .into_iter()
                .map(|nearby| nearby.station)
                .collect();
            format!("isd-stations-near-{}-{}", lat, lon)
        }
        _ => "isd-stations".to_string(),
    };

    Ok(format!("File saved to `{}`", ctx.save(&stations_to_batch(&stations)?, &stem)?))
}
