use anyhow::Result;
use noaadata::buoy::{self, stations_to_batch, BuoyDataset};

use super::Context;
use crate::cli::create_spinner;

pub async fn buoy(ctx: &Context, dataset: BuoyDataset, station: &str, year: i32) -> Result<String> {
    let bar = create_spinner(format!("Fetching {} {} for {}...", dataset, station, year));
    let batch = buoy::buoy(&ctx.client, dataset, station, year, ctx.refresh).await?;
    bar.finish_with_message(format!("{} rows decoded", batch.num_rows()));

    let path = ctx.save(&batch, &format!("buoy-{}-{}-{}", dataset, station, year))?;
    Ok(format!("File saved to `{}`", path))
}

pub async fn stations(ctx: &Context) -> Result<String> {
    let bar = create_spinner("Fetching active NDBC stations...".to_string());
    let stations = buoy::stations(&ctx.client, ctx.refresh).await?;
    bar.finish_with_message(format!("{} stations", stations.len()));

    Ok(format!(
        "File saved to `{}`",
        ctx.save(&stations_to_batch(&stations)?, "buoy-stations")?
    ))
}
