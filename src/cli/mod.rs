//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use noaadata::{buoy::BuoyDataset, erddap::DatasetKind, ghcnd::archive::Subset, storms::Basin, Config, NoaaClient};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Fetches NOAA climate and ocean data and saves it as parquet
pub struct Cli {
    /// Root of the response cache
    #[arg(long, global = true, env = "NOAA_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// ERDDAP server base URL
    #[arg(long, global = true, env = "ERDDAP_URL")]
    pub erddap_url: Option<String>,

    /// Token for the NCDC legacy web services
    #[arg(long, global = true, env = "NOAA_LEGACY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory parquet files are written to [default: home directory]
    #[arg(short, long, global = true, env = "NOAA_OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Fetch again even when the file is already cached
    #[arg(long, global = true)]
    pub refresh: bool,

    /// Log filter, e.g. `info` or `noaadata=debug`
    #[arg(long, global = true, env = "NOAA_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Client from the environment with command line overrides applied.
    pub fn client(&self) -> anyhow::Result<NoaaClient> {
        let mut config = Config::from_env()?;
        if let Some(dir) = &self.cache_dir {
            config = config.with_cache_dir(dir);
        }
        if let Some(url) = &self.erddap_url {
            config = config.with_erddap_url(url);
        }
        if let Some(token) = &self.token {
            config = config.with_legacy_token(token);
        }

        Ok(NoaaClient::new(config)?)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Get daily records for one GHCND station
    Ghcnd {
        /// 11 character station id, e.g. USW00014895
        station: String,
        /// Element codes to keep, comma separated, e.g. TMAX,PRCP
        #[arg(long, value_delimiter = ',')]
        elements: Vec<String>,
        /// First date to keep
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date to keep
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Save the raw station-month rows instead of one file per element
        #[arg(long)]
        wide: bool,
    },
    /// Get GHCND station metadata
    GhcndStations {
        /// Save the element inventory instead of the station list
        #[arg(long)]
        inventory: bool,
    },
    /// Get every station of a bulk GHCND subset in one long table
    GhcndSubset {
        /// hcn, gsn or all
        #[arg(default_value = "hcn")]
        subset: Subset,
    },
    /// Get one year of hourly ISD observations for a station
    Isd {
        /// USAF id, e.g. 722010
        usaf: String,
        /// WBAN id, e.g. 12836
        wban: String,
        year: i32,
    },
    /// Get ISD stations, optionally only those near a point
    IsdStations {
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
        /// Search radius in km
        #[arg(long, default_value_t = 50.0)]
        radius: f64,
    },
    /// Search an ERDDAP server for datasets
    ErddapSearch {
        query: String,
        /// grid or table
        #[arg(long)]
        kind: Option<DatasetKind>,
    },
    /// Show the dimensions and variables of an ERDDAP dataset
    ErddapInfo { dataset: String },
    /// Get a subset of an ERDDAP griddap dataset
    ErddapGrid(command::erddap::GridArgs),
    /// Get rows of an ERDDAP tabledap dataset
    ErddapTable(command::erddap::TableArgs),
    /// Get IBTrACS storm tracks
    Storms {
        /// ACTIVE, ALL, EP, NA, NI, SA, SI, SP, WP, last3years or since1980
        #[arg(default_value = "NA")]
        basin: Basin,
        /// Storm serial id
        #[arg(long)]
        sid: Option<String>,
        #[arg(long)]
        season: Option<i32>,
    },
    /// Get one year of NDBC historical buoy data
    Buoy {
        /// stdmet, cwind, ocean, swden or srad
        dataset: BuoyDataset,
        station: String,
        year: i32,
    },
    /// Get the active NDBC station list
    BuoyStations {},
    /// Search station metadata in HOMR
    Homr(HomrArgs),
    /// Query the NCDC legacy web services
    Legacy {
        #[command(subcommand)]
        command: LegacyCommands,
    },
}

#[derive(Args)]
pub struct HomrArgs {
    /// Station identifier, e.g. COOP:046742
    #[arg(long)]
    pub qid: Option<String>,
    /// exact, starts or contains
    #[arg(long)]
    pub qid_mod: Option<String>,
    /// NCDC station id
    #[arg(long)]
    pub station: Option<String>,
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub county: Option<String>,
    #[arg(long)]
    pub country: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub begin_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    /// Station headers only
    #[arg(long)]
    pub headers_only: bool,
}

#[derive(Subcommand)]
pub enum LegacyCommands {
    /// Variables offered by a dataset
    Variables { dataset: String },
    /// Sites reporting to a dataset
    Sites { dataset: String },
    /// Metadata for one site
    SiteInfo { dataset: String, site: String },
    /// Values of one variable at one site
    Data {
        dataset: String,
        site: String,
        variable: String,
        begin: String,
        end: String,
    },
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    let style = ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    ProgressBar::new(size).with_message(message).with_style(style)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn should_have_valid_command_definitions() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_parse_ghcnd_options() {
        let cli = Cli::parse_from([
            "noaadata",
            "ghcnd",
            "USW00014895",
            "--elements",
            "TMAX,PRCP",
            "--from",
            "2020-01-01",
        ]);

        match cli.command {
            Commands::Ghcnd {
                station,
                elements,
                from,
                to,
                wide,
            } => {
                assert_eq!(station, "USW00014895");
                assert_eq!(elements, vec!["TMAX", "PRCP"]);
                assert_eq!(from, NaiveDate::from_ymd_opt(2020, 1, 1));
                assert_eq!(to, None);
                assert!(!wide);
            }
            _ => panic!("expected the ghcnd command"),
        }
    }

    #[test]
    fn should_parse_value_enums_and_global_flags() {
        let cli = Cli::parse_from(["noaadata", "buoy", "stdmet", "41001", "2020", "--refresh", "-o", "/tmp/out"]);
        assert!(cli.refresh);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out")));
        assert!(matches!(
            cli.command,
            Commands::Buoy {
                dataset: BuoyDataset::Stdmet,
                year: 2020,
                ..
            }
        ));

        let cli = Cli::parse_from(["noaadata", "erddap-search", "sst", "--kind", "grid"]);
        assert!(matches!(
            cli.command,
            Commands::ErddapSearch {
                kind: Some(DatasetKind::Grid),
                ..
            }
        ));
    }

    #[test]
    fn should_require_both_coordinates() {
        assert!(Cli::try_parse_from(["noaadata", "isd-stations", "--lat", "51.5"]).is_err());
        assert!(Cli::try_parse_from(["noaadata", "isd-stations", "--lat", "51.5", "--lon", "0.1"]).is_ok());
    }
}
