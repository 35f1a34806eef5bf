use anyhow::Result;
use chrono::NaiveDate;
use noaadata::ghcnd::{
    self,
    archive::{fetch_subset, read_subset, Subset},
    splitvars::to_long_batch,
    stations::{inventory_to_batch, make_lookup, stations_to_batch},
    to_wide_batch, SearchOptions,
};

use super::Context;
use crate::cli::{create_progress_bar, create_spinner};

pub async fn ghcnd(
    ctx: &Context,
    station: &str,
    elements: &[String],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    wide: bool,
) -> Result<String> {
    let bar = create_spinner(format!("Fetching {}...", station));

    if wide {
        let readings = ghcnd::ghcnd(&ctx.client, station, ctx.refresh).await?;
        bar.finish_with_message(format!("{} station-months decoded", readings.len()));
        return ctx.save(&to_wide_batch(&readings)?, &format!("ghcnd-{}", station));
    }

    let options = SearchOptions {
        elements: elements.to_vec(),
        date_min: from,
        date_max: to,
        refresh: ctx.refresh,
    };
    let tables = ghcnd::search(&ctx.client, station, &options).await?;
    bar.finish_with_message(format!("{} elements decoded", tables.len()));

    let mut saved = Vec::new();
    for (element, table) in &tables {
        saved.push(ctx.save(table, &format!("ghcnd-{}-{}", station, element))?);
    }
    if saved.is_empty() {
        return Ok(format!("No matching elements for {}", station));
    }

    Ok(format!("Files saved to:\n{}", saved.join("\n")))
}

pub async fn stations(ctx: &Context, inventory: bool) -> Result<String> {
    let bar = create_spinner("Fetching GHCND station metadata...".to_string());

    let (batch, stem) = if inventory {
        let entries = ghcnd::stations::inventory(&ctx.client, ctx.refresh).await?;
        (inventory_to_batch(&entries)?, "ghcnd-inventory")
    } else {
        let stations = ghcnd::stations::stations(&ctx.client, ctx.refresh).await?;
        (stations_to_batch(&stations)?, "ghcnd-stations")
    };
    bar.finish_with_message(format!("{} rows decoded", batch.num_rows()));

    Ok(format!("File saved to `{}`", ctx.save(&batch, stem)?))
}

pub async fn subset(ctx: &Context, subset: Subset) -> Result<String> {
    let bar = create_progress_bar(0, format!("Fetching {} archive...", subset));
    let dir = fetch_subset(&ctx.client, subset, ctx.refresh, Some(&bar)).await?;
    bar.finish_with_message(format!("{} archive unpacked", subset));

    let bar = create_progress_bar(0, "Decoding station files...".to_string());
    let readings = read_subset(&dir, Some(bar.clone())).await?;
    bar.finish_with_message(format!("{} station-months decoded", readings.len()));

    let spinner = create_spinner("Attaching station coordinates...".to_string());
    let stations = ghcnd::stations::stations(&ctx.client, ctx.refresh).await?;
    let batch = to_long_batch(&readings, &make_lookup(&stations))?;
    spinner.finish_with_message(format!("{} observations", batch.num_rows()));

    Ok(format!(
        "File saved to `{}`",
        ctx.save(&batch, &format!("ghcnd-{}-daily", subset))?
    ))
}
