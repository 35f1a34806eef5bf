//! IBTrACS best-track storm data.

use std::{fmt, fs, str::FromStr};

use arrow::record_batch::RecordBatch;
use tracing::info;

use crate::{
    table::{build_inferred, parse_csv, Column, Row},
    Error, NoaaClient, Result,
};

const VERSION: &str = "v04r01";

/// IBTrACS subsets as named in the CSV file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basin {
    Active,
    All,
    EasternPacific,
    NorthAtlantic,
    NorthIndian,
    SouthAtlantic,
    SouthIndian,
    SouthPacific,
    WesternPacific,
    LastThreeYears,
    Since1980,
}

impl Basin {
    pub const ALL: [Basin; 11] = [
        Basin::Active,
        Basin::All,
        Basin::EasternPacific,
        Basin::NorthAtlantic,
        Basin::NorthIndian,
        Basin::SouthAtlantic,
        Basin::SouthIndian,
        Basin::SouthPacific,
        Basin::WesternPacific,
        Basin::LastThreeYears,
        Basin::Since1980,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Basin::Active => "ACTIVE",
            Basin::All => "ALL",
            Basin::EasternPacific => "EP",
            Basin::NorthAtlantic => "NA",
            Basin::NorthIndian => "NI",
            Basin::SouthAtlantic => "SA",
            Basin::SouthIndian => "SI",
            Basin::SouthPacific => "SP",
            Basin::WesternPacific => "WP",
            Basin::LastThreeYears => "last3years",
            Basin::Since1980 => "since1980",
        }
    }

    pub fn file_name(&self) -> String {
        format!("ibtracs.{}.list.{}.csv", self.code(), VERSION)
    }
}

impl fmt::Display for Basin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Basin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Basin::ALL
            .into_iter()
            .find(|b| b.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Basin::ALL.iter().map(|b| b.code()).collect();
                Error::query(format!("unknown basin {:?}, expected one of {}", s, known.join(", ")))
            })
    }
}

/// Row filter. Both conditions must hold when both are set.
#[derive(Debug, Clone, Default)]
pub struct StormFilter {
    /// Storm serial id, e.g. `2005236N23285`.
    pub sid: Option<String>,
    pub season: Option<i32>,
}

impl StormFilter {
    fn keeps(&self, row: &Row, sid_col: Option<usize>, season_col: Option<usize>) -> bool {
        let cell = |col: Option<usize>| col.and_then(|c| row.get(c)).and_then(|v| v.as_deref());

        let sid_ok = self
            .sid
            .as_deref()
            .map_or(true, |sid| cell(sid_col) == Some(sid));
        let season_ok = self.season.map_or(true, |season| {
            cell(season_col).and_then(|v| v.parse::<i32>().ok()) == Some(season)
        });

        sid_ok && season_ok
    }
}

fn column_index(columns: &[Column], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.name == name)
}

/// Decodes an IBTrACS CSV body (names row, units row, data) and applies `filter`.
pub fn parse_storms(text: &str, filter: &StormFilter) -> Result<RecordBatch> {
    let (columns, rows) = parse_csv(text, 2)?;
    let sid_col = column_index(&columns, "SID");
    let season_col = column_index(&columns, "SEASON");
    if (filter.sid.is_some() && sid_col.is_none()) || (filter.season.is_some() && season_col.is_none()) {
        return Err(Error::decode("IBTrACS file lacks SID or SEASON columns"));
    }

    let rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| filter.keeps(row, sid_col, season_col))
        .collect();

    build_inferred(&columns, &rows)
}

/// Track points for `basin`, cached by file name.
pub async fn storms(client: &NoaaClient, basin: Basin, filter: &StormFilter, overwrite: bool) -> Result<RecordBatch> {
    let url = format!("{}/{}", client.config().endpoints.ibtracs, basin.file_name());
    let path = client.cache("storms", overwrite).fetch_named(client.http(), &url).await?;

    let table = parse_storms(&fs::read_to_string(path)?, filter)?;
    info!(%basin, rows = table.num_rows(), "decoded IBTrACS file");

    Ok(table)
}

// -- Tests -------------------------------------------------------------------
