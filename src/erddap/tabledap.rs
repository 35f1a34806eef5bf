//! Tabular data requests.

use tracing::info;

use super::{
    griddap::fetch_and_decode,
    query::{build_table_query, encode_parts},
    DatasetInfo, ErddapData, Format, TableQuery,
};
use crate::{NoaaClient, Result};

/// Fetches rows of `info` matching `query`, cached by request fingerprint.
pub async fn table(
    client: &NoaaClient,
    info: &DatasetInfo,
    query: &TableQuery,
    format: Format,
    overwrite: bool,
) -> Result<ErddapData> {
    let parts = build_table_query(info, query)?;
    let args = parts.join("&");
    let url = format!(
        "{}tabledap/{}.{}",
        info.base_url,
        info.dataset_id,
        format.extension()
    );
    info!(dataset = %info.dataset_id, query = %args, "tabledap request");

    fetch_and_decode(client, &url, &args, &encode_parts(&parts), format, overwrite).await
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        erddap::{info::test::TABLE_INFO, Fields, Op},
        table::{f64_value, string_value},
        test_support::{serve, test_client, Route},
    };

    const TABLE_CSV: &str = "station,time,wtmp\n\
,UTC,degree_C\n\
41001,2020-01-01T00:00:00Z,22.1\n\
41001,2020-01-01T01:00:00Z,22.0\n\
41001,2020-01-01T02:00:00Z,NaN\n";

    #[tokio::test]
    async fn should_fetch_table() {
        let server = serve(vec![Route::ok("/erddap/tabledap/ndbc_met.csv", TABLE_CSV)]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());
        let info = DatasetInfo::from_json("ndbc_met", &server.url("/erddap/"), TABLE_INFO).unwrap();

        let query = TableQuery::new()
            .fields(Fields::Only(vec!["station".to_string(), "time".to_string(), "wtmp".to_string()]))
            .constraint("station", Op::Eq, "41001")
            .constraint("time", Op::Ge, "2020-01-01");

        let data = table(&client, &info, &query, Format::Csv, false).await.unwrap();
        let batch = data.table.unwrap();

        assert_eq!(batch.num_rows(), 3);
        assert_eq!(f64_value(&batch, "station", 0), Some(41001.0));
        assert_eq!(f64_value(&batch, "wtmp", 2), None);
        assert_eq!(string_value(&batch, "time", 1), Some("2020-01-01T01:00:00Z".to_string()));

        assert_eq!(
            server.requests()[0],
            "/erddap/tabledap/ndbc_met.csv?station,time,wtmp&station=%2241001%22&time%3E=2020-01-01"
        );

        table(&client, &info, &query, Format::Csv, false).await.unwrap();
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn should_request_every_variable_without_field_list() {
        let server = serve(vec![Route::ok("/erddap/tabledap/ndbc_met.csv", TABLE_CSV)]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());
        let info = DatasetInfo::from_json("ndbc_met", &server.url("/erddap/"), TABLE_INFO).unwrap();

        table(&client, &info, &TableQuery::new(), Format::Csv, false).await.unwrap();

        assert_eq!(server.requests()[0], "/erddap/tabledap/ndbc_met.csv");
    }
}
