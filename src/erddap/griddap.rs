//! Gridded data requests.

use std::fs;

use tracing::{info, warn};

use super::{
    query::{build_grid_query, encode_part},
    DatasetInfo, ErddapData, Format, GridQuery,
};
use crate::{download::check_server_error_file, table::csv_to_batch, NoaaClient, Result};

/// Fetches a griddap subset of `info`, serving it from the cache when the same
/// request was made before and `overwrite` is false.
pub async fn grid(
    client: &NoaaClient,
    info: &DatasetInfo,
    query: &GridQuery,
    format: Format,
    overwrite: bool,
) -> Result<ErddapData> {
    let args = build_grid_query(info, query)?;
    let url = format!(
        "{}griddap/{}.{}",
        info.base_url,
        info.dataset_id,
        format.extension()
    );
    info!(dataset = %info.dataset_id, query = %args, "griddap request");

    fetch_and_decode(client, &url, &args, &encode_part(&args), format, overwrite).await
}

/// Shared by griddap and tabledap: cache fetch, server error check, CSV decode.
pub(crate) async fn fetch_and_decode(
    client: &NoaaClient,
    url: &str,
    args: &str,
    encoded_query: &str,
    format: Format,
    overwrite: bool,
) -> Result<ErddapData> {
    let cache = client.cache("erddap", overwrite);
    let path = cache
        .fetch_fingerprinted(client.http(), url, args, encoded_query, format.extension())
        .await?;

    if format == Format::Csv {
        if let Err(e) = check_server_error_file(&path) {
            warn!(path = %path.display(), "removing cached error response");
            fs::remove_file(&path)?;
            return Err(e);
        }
        let table = csv_to_batch(&fs::read_to_string(&path)?, 2)?;
        return Ok(ErddapData {
            path,
            table: Some(table),
        });
    }

    Ok(ErddapData { path, table: None })
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        cache::DiskCache,
        erddap::{info::test::GRID_INFO, DatasetInfo, Fields},
        table::units,
        test_support::{serve, test_client, Route},
        Error,
    };

    const GRID_CSV: &str = "time,latitude,longitude,sst\n\
UTC,degrees_north,degrees_east,degree_C\n\
2003-01-01T00:00:00Z,20.125,10.125,24.1\n\
2003-01-01T00:00:00Z,20.375,10.125,NaN\n";

    fn info_for(server_url: &str) -> DatasetInfo {
        DatasetInfo::from_json("noaa_sst", server_url, GRID_INFO).unwrap()
    }

    fn query() -> GridQuery {
        GridQuery::new()
            .range("latitude", 20, 20.5)
            .range("longitude", 10, 10.2)
            .fields(Fields::Only(vec!["sst".to_string()]))
    }

    #[tokio::test]
    async fn should_fetch_decode_and_cache_grid() {
        let server = serve(vec![Route::ok("/erddap/griddap/noaa_sst.csv", GRID_CSV)]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());
        let info = info_for(&server.url("/erddap/"));

        let first = grid(&client, &info, &query(), Format::Csv, false).await.unwrap();
        let second = grid(&client, &info, &query(), Format::Csv, false).await.unwrap();

        assert_eq!(server.hits(), 1);
        assert_eq!(first.path, second.path);

        let args = build_grid_query(&info, &query()).unwrap();
        let url = server.url("/erddap/griddap/noaa_sst.csv");
        assert_eq!(
            first.path,
            dir.path()
                .join("erddap")
                .join(format!("{}.csv", DiskCache::fingerprint(&url, &args)))
        );

        let table = first.table.unwrap();
        assert_eq!(table.num_columns(), 4);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(units(&table, "sst"), Some("degree_C"));
    }

    #[tokio::test]
    async fn should_send_encoded_bracket_query() {
        let server = serve(vec![Route::ok("/erddap/griddap/noaa_sst.csv", GRID_CSV)]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());
        let info = info_for(&server.url("/erddap/"));

        grid(&client, &info, &query(), Format::Csv, false).await.unwrap();

        let request = &server.requests()[0];
        assert!(request.starts_with("/erddap/griddap/noaa_sst.csv?sst%5B(2003-01-01T00:00:00Z):1:"));
    }

    #[tokio::test]
    async fn should_keep_netcdf_undecoded() {
        let server = serve(vec![Route::ok("/erddap/griddap/noaa_sst.nc", b"CDF\x01binary".to_vec())]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());
        let info = info_for(&server.url("/erddap/"));

        let data = grid(&client, &info, &query(), Format::Nc, false).await.unwrap();

        assert!(data.table.is_none());
        assert_eq!(data.path.extension().unwrap(), "nc");
        assert_eq!(std::fs::read(&data.path).unwrap(), b"CDF\x01binary");
    }

    #[tokio::test]
    async fn should_not_cache_failed_requests() {
        let server = serve(vec![Route::status(
            "/erddap/griddap/noaa_sst.csv",
            404,
            "Error {\n    code=404;\n    message=\"Not Found: Your query produced no matching results.\";\n}",
        )])
        .await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());
        let info = info_for(&server.url("/erddap/"));

        let err = grid(&client, &info, &query(), Format::Csv, false).await.unwrap_err();

        assert!(matches!(err, Error::Status { .. }));
        let cached = std::fs::read_dir(dir.path().join("erddap")).unwrap().count();
        assert_eq!(cached, 0);
    }

    #[tokio::test]
    async fn should_drop_error_body_served_with_ok_status() {
        let server = serve(vec![Route::ok(
            "/erddap/griddap/noaa_sst.csv",
            "Error {\n    code=500;\n    message=\"Query error\";\n}",
        )])
        .await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());
        let info = info_for(&server.url("/erddap/"));

        let err = grid(&client, &info, &query(), Format::Csv, false).await.unwrap_err();

        assert!(matches!(err, Error::Server(_)));
        let cached = std::fs::read_dir(dir.path().join("erddap")).unwrap().count();
        assert_eq!(cached, 0);
    }
}
