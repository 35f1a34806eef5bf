//! Full-text dataset search and dataset listings.

use tracing::{debug, info};

use super::{DatasetKind, JsonResponse, JsonTable};
use crate::{download::get_text, Error, NoaaClient, Result};

const NO_RESULTS: &str = "no matching results";

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub dataset_id: String,
    pub kind: DatasetKind,
}

/// Reads hits out of a search or listing response. Rows offered by neither
/// protocol are skipped; so are rows of the other kind when `kind` is given.
pub(crate) fn parse_hits(json: &str, kind: Option<DatasetKind>) -> Result<Vec<SearchHit>> {
    let response: JsonResponse = serde_json::from_str(json)?;
    let table = response.table;

    let title = table.column("Title");
    let dataset_id = table.column("Dataset ID");
    let griddap = table.column("griddap");
    let tabledap = table.column("tabledap");
    if dataset_id.is_none() {
        return Err(Error::decode("search response lacks a Dataset ID column"));
    }

    let hits = table
        .rows
        .iter()
        .filter_map(|row| {
            let hit_kind = if !JsonTable::cell(row, griddap).is_empty() {
                DatasetKind::Grid
            } else if !JsonTable::cell(row, tabledap).is_empty() {
                DatasetKind::Table
            } else {
                return None;
            };
            Some(SearchHit {
                title: JsonTable::cell(row, title),
                dataset_id: JsonTable::cell(row, dataset_id),
                kind: hit_kind,
            })
        })
        .filter(|hit| kind.map_or(true, |k| hit.kind == k))
        .collect();

    Ok(hits)
}

fn empty_on_no_results(result: Result<String>) -> Result<Option<String>> {
    match result {
        Ok(body) => Ok(Some(body)),
        Err(Error::Server(msg)) if msg.contains(NO_RESULTS) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Searches the configured server for `query`, optionally keeping only one kind.
pub async fn search(client: &NoaaClient, query: &str, kind: Option<DatasetKind>) -> Result<Vec<SearchHit>> {
    let url = format!("{}search/index.json", client.config().erddap_url);
    let params = [
        ("page", "1".to_string()),
        ("itemsPerPage", "1000".to_string()),
        ("searchFor", query.to_string()),
    ];

    let Some(body) = empty_on_no_results(get_text(client.http(), &url, &params).await)? else {
        debug!(%query, "no datasets matched");
        return Ok(Vec::new());
    };
    let hits = parse_hits(&body, kind)?;
    info!(%query, hits = hits.len(), "search complete");

    Ok(hits)
}

/// Every dataset the configured server offers under `kind`.
pub async fn list_datasets(client: &NoaaClient, kind: DatasetKind) -> Result<Vec<SearchHit>> {
    let url = format!("{}{}/index.json", client.config().erddap_url, kind.protocol());
    let params = [("page", "1".to_string()), ("itemsPerPage", "10000".to_string())];

    let Some(body) = empty_on_no_results(get_text(client.http(), &url, &params).await)? else {
        return Ok(Vec::new());
    };
    parse_hits(&body, Some(kind))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::test_support::{serve, test_client, Route};

    const SEARCH: &str = r#"{
  "table": {
    "columnNames": ["griddap", "Subset", "tabledap", "Make A Graph", "Title", "Summary", "Institution", "Dataset ID"],
    "rows": [
      ["https://e.org/erddap/griddap/noaa_sst", "", "", "", "SST, Daily Optimum Interpolation", "", "NOAA", "noaa_sst"],
      ["", "", "https://e.org/erddap/tabledap/ndbc_met", "", "NDBC Standard Meteorological Buoy Data", "", "NOAA NDBC", "ndbc_met"],
      ["", "", "", "", "Files only", "", "NOAA", "files_only"],
      ["https://e.org/erddap/griddap/jplMURSST", "", "", "", "MUR SST", "", "NASA JPL", "jplMURSST"]
    ]
  }
}"#;

    #[test]
    fn should_classify_hits() {
        let hits = parse_hits(SEARCH, None).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].dataset_id, "noaa_sst");
        assert_eq!(hits[0].kind, DatasetKind::Grid);
        assert_eq!(hits[1].kind, DatasetKind::Table);
        assert_eq!(hits[1].title, "NDBC Standard Meteorological Buoy Data");
    }

    #[test]
    fn should_keep_only_requested_kind() {
        let grids = parse_hits(SEARCH, Some(DatasetKind::Grid)).unwrap();
        let tables = parse_hits(SEARCH, Some(DatasetKind::Table)).unwrap();

        assert!(grids.iter().all(|h| h.kind == DatasetKind::Grid));
        assert_eq!(grids.len(), 2);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].dataset_id, "ndbc_met");
    }

    #[tokio::test]
    async fn should_send_search_terms() {
        let server = serve(vec![Route::ok("/erddap/search/index.json", SEARCH)]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());

        let hits = search(&client, "sea surface", Some(DatasetKind::Table)).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(
            server.requests()[0],
            "/erddap/search/index.json?page=1&itemsPerPage=1000&searchFor=sea+surface"
        );
    }

    #[tokio::test]
    async fn should_treat_no_matches_as_empty() {
        let server = serve(vec![Route::status(
            "/erddap/search/index.json",
            404,
            "Error {\n    code=404;\n    message=\"Not Found: Your query produced no matching results.\";\n}",
        )])
        .await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());

        let hits = search(&client, "nothing here", None).await.unwrap();

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn should_list_datasets_of_one_kind() {
        let server = serve(vec![Route::ok("/erddap/griddap/index.json", SEARCH)]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());

        let hits = list_datasets(&client, DatasetKind::Grid).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(server.requests()[0], "/erddap/griddap/index.json?page=1&itemsPerPage=10000");
    }
}
