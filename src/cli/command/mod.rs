pub mod buoy;
pub mod erddap;
pub mod ghcnd;
pub mod homr;
pub mod isd;
pub mod legacy;
pub mod storms;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, Local};
use noaadata::{output::save_batch, NoaaClient};

use super::{create_spinner, Cli, Commands};

/// What every command needs besides its own arguments.
pub struct Context {
    pub client: NoaaClient,
    pub output: Option<PathBuf>,
    pub refresh: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Ok(Context {
            client: cli.client()?,
            output: cli.output.clone(),
            refresh: cli.refresh,
        })
    }

    /// Dated parquet path for `stem` in the output directory.
    pub fn parquet_path(&self, stem: &str) -> Result<PathBuf> {
        let dir = match &self.output {
            Some(dir) => dir.clone(),
            None => dirs::home_dir().ok_or_else(|| anyhow!("no home directory, pass --output"))?,
        };
        Ok(dir.join(make_parquet_file_name(stem)))
    }

    /// Writes `batch` to the dated file for `stem` and returns its path.
    pub fn save(&self, batch: &RecordBatch, stem: &str) -> Result<String> {
        let path = self.parquet_path(stem)?;
        save(batch, &path)?;
        Ok(path.to_string_lossy().to_string())
    }
}

fn save(batch: &RecordBatch, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bar = create_spinner(format!("Saving {}...", path.display()));
    save_batch(batch, path)?;
    bar.finish_with_message(format!("Saved {} rows", batch.num_rows()));
    Ok(())
}

pub fn make_parquet_file_name(stem: &str) -> String {
    let today = Local::now();
    let stem: String = stem
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();

    format!(
        "{}-{}-{:02}-{:02}.parquet",
        stem,
        today.year(),
        today.month(),
        today.day()
    )
}

/// Runs the selected command, returning the message to print.
pub async fn run(cli: &Cli) -> Result<String> {
    let ctx = Context::from_cli(cli)?;

    match &cli.command {
        Commands::Ghcnd {
            station,
            elements,
            from,
            to,
            wide,
        } => ghcnd::ghcnd(&ctx, station, elements, *from, *to, *wide).await,
        Commands::GhcndStations { inventory } => ghcnd::stations(&ctx, *inventory).await,
        Commands::GhcndSubset { subset } => ghcnd::subset(&ctx, *subset).await,
        Commands::Isd { usaf, wban, year } => isd::isd(&ctx, usaf, wban, *year).await,
        Commands::IsdStations { lat, lon, radius } => isd::stations(&ctx, *lat, *lon, *radius).await,
        Commands::ErddapSearch { query, kind } => erddap::search(&ctx, query, *kind).await,
        Commands::ErddapInfo { dataset } => erddap::info(&ctx, dataset).await,
        Commands::ErddapGrid(args) => erddap::grid(&ctx, args).await,
        Commands::ErddapTable(args) => erddap::table(&ctx, args).await,
        Commands::Storms { basin, sid, season } => storms::storms(&ctx, *basin, sid.clone(), *season).await,
        Commands::Buoy {
            dataset,
            station,
            year,
        } => buoy::buoy(&ctx, *dataset, station, *year).await,
        Commands::BuoyStations {} => buoy::stations(&ctx).await,
        Commands::Homr(args) => homr::homr(&ctx, args).await,
        Commands::Legacy { command } => legacy::legacy(&ctx, command).await,
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_make_dated_file_name() {
        let name = make_parquet_file_name("ghcnd-USW00014895-tmax");
        let today = Local::now();

        assert_eq!(
            name,
            format!(
                "ghcnd-usw00014895-tmax-{}-{:02}-{:02}.parquet",
                today.year(),
                today.month(),
                today.day()
            )
        );
    }

    #[test]
    fn should_replace_unsafe_characters() {
        let name = make_parquet_file_name("erddap/noaa sst");
        assert!(name.starts_with("erddap-noaa-sst-"));
    }
}
