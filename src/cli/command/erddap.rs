use std::fmt::Write;

use anyhow::{anyhow, Result};
use clap::Args;
use noaadata::erddap::{self, Constraint, DatasetKind, ErddapData, Fields, Format, GridQuery, OrderBy, Stride, TableQuery, Units};

use super::Context;
use crate::cli::create_spinner;

#[derive(Args)]
pub struct GridArgs {
    pub dataset: String,
    /// Dimension range as `name=start,stop`, repeatable. Missing dimensions span their full range
    #[arg(long = "range")]
    pub ranges: Vec<String>,
    /// Variables to fetch, comma separated, or `none` for dimension values only
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,
    /// Stride for every dimension, or one per dimension comma separated
    #[arg(long, value_delimiter = ',')]
    pub stride: Vec<u32>,
    /// Keep the response as NetCDF instead of converting it to parquet
    #[arg(long)]
    pub nc: bool,
}

#[derive(Args)]
pub struct TableArgs {
    pub dataset: String,
    /// Variables to fetch, comma separated
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,
    /// Constraint such as `time>=2020-01-01`, repeatable
    #[arg(long = "where")]
    pub constraints: Vec<String>,
    /// Drop duplicate rows
    #[arg(long)]
    pub distinct: bool,
    /// Sort by these variables, comma separated
    #[arg(long, value_delimiter = ',')]
    pub order_by: Vec<String>,
    /// Ask for UCUM unit strings instead of UDUNITS
    #[arg(long)]
    pub ucum: bool,
    /// Keep the response as NetCDF instead of converting it to parquet
    #[arg(long)]
    pub nc: bool,
}

fn fields(values: &[String]) -> Fields {
    match values {
        [] => Fields::All,
        [one] if one.eq_ignore_ascii_case("none") => Fields::None,
        [one] if one.eq_ignore_ascii_case("all") => Fields::All,
        many => Fields::Only(many.to_vec()),
    }
}

fn format(nc: bool) -> Format {
    if nc {
        Format::Nc
    } else {
        Format::Csv
    }
}

/// Parses `name=start,stop`. Time values contain colons, so those can't separate.
fn parse_range(s: &str) -> Result<(String, String, String)> {
    let bad = || anyhow!("range {:?} is not name=start,stop", s);
    let (name, range) = s.split_once('=').ok_or_else(bad)?;
    let (start, stop) = range.split_once(',').ok_or_else(bad)?;
    if name.trim().is_empty() || start.trim().is_empty() || stop.trim().is_empty() {
        return Err(bad());
    }

    Ok((name.trim().to_string(), start.trim().to_string(), stop.trim().to_string()))
}

fn finish(ctx: &Context, data: ErddapData, stem: &str) -> Result<String> {
    match data.table {
        Some(table) => Ok(format!("File saved to `{}`", ctx.save(&table, stem)?)),
        None => Ok(format!("NetCDF response cached at `{}`", data.path.display())),
    }
}

pub async fn search(ctx: &Context, query: &str, kind: Option<DatasetKind>) -> Result<String> {
    let hits = erddap::search(&ctx.client, query, kind).await?;
    if hits.is_empty() {
        return Ok(format!("No datasets match {:?}", query));
    }

    let mut out = String::new();
    for hit in &hits {
        writeln!(out, "{:<9} {:<40} {}", hit.kind, hit.dataset_id, hit.title)?;
    }
    write!(out, "{} datasets", hits.len())?;

    Ok(out)
}

pub async fn info(ctx: &Context, dataset: &str) -> Result<String> {
    let info = erddap::info(&ctx.client, dataset).await?;

    let mut out = format!("{} ({})\n", info.dataset_id, info.kind);
    if !info.dimensions.is_empty() {
        writeln!(out, "Dimensions:")?;
        for name in &info.dimensions {
            let range = info
                .query_range(name)
                .map(|(min, max)| format!("{} to {}", min, max))
                .unwrap_or_default();
            writeln!(out, "  {:<20} {}", name, range)?;
        }
    }
    writeln!(out, "Variables:")?;
    for name in &info.variables {
        writeln!(
            out,
            "  {:<20} {:<8} {}",
            name,
            info.data_type(name).unwrap_or(""),
            info.units(name).unwrap_or("")
        )?;
    }

    Ok(out.trim_end().to_string())
}

pub async fn grid(ctx: &Context, args: &GridArgs) -> Result<String> {
    let info = erddap::info(&ctx.client, &args.dataset).await?;

    let mut query = GridQuery::new().fields(fields(&args.fields));
    for range in &args.ranges {
        let (name, start, stop) = parse_range(range)?;
        query = query.range(&name, start, stop);
    }
    query = match args.stride.as_slice() {
        [] => query,
        [one] => query.stride(Stride::Scalar(*one)),
        many => query.stride(Stride::PerDimension(many.to_vec())),
    };

    let bar = create_spinner(format!("Fetching {}...", args.dataset));
    let data = erddap::grid(&ctx.client, &info, &query, format(args.nc), ctx.refresh).await?;
    bar.finish_with_message("Grid fetched");

    finish(ctx, data, &format!("erddap-{}", args.dataset))
}

pub async fn table(ctx: &Context, args: &TableArgs) -> Result<String> {
    let info = erddap::info(&ctx.client, &args.dataset).await?;

    let mut query = TableQuery::new().fields(fields(&args.fields));
    for c in &args.constraints {
        query.constraints.push(Constraint::parse(c)?);
    }
    if args.distinct {
        query = query.distinct();
    }
    if !args.order_by.is_empty() {
        query = query.order_by(OrderBy::Asc(args.order_by.clone()));
    }
    if args.ucum {
        query = query.units(Units::Ucum);
    }

    let bar = create_spinner(format!("Fetching {}...", args.dataset));
    let data = erddap::table(&ctx.client, &info, &query, format(args.nc), ctx.refresh).await?;
    bar.finish_with_message("Table fetched");

    finish(ctx, data, &format!("erddap-{}", args.dataset))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_parse_range() {
        assert_eq!(
            parse_range("time=2020-01-01T00:00:00Z,2020-01-02T00:00:00Z").unwrap(),
            (
                "time".to_string(),
                "2020-01-01T00:00:00Z".to_string(),
                "2020-01-02T00:00:00Z".to_string()
            )
        );
        assert_eq!(
            parse_range("latitude = 20, 30").unwrap(),
            ("latitude".to_string(), "20".to_string(), "30".to_string())
        );
        assert!(parse_range("latitude").is_err());
        assert!(parse_range("latitude=20").is_err());
        assert!(parse_range("=20,30").is_err());
    }

    #[test]
    fn should_map_field_lists() {
        assert_eq!(fields(&[]), Fields::All);
        assert_eq!(fields(&["none".to_string()]), Fields::None);
        assert_eq!(
            fields(&["sst".to_string(), "anom".to_string()]),
            Fields::Only(vec!["sst".to_string(), "anom".to_string()])
        );
    }
}
