//! NCDC legacy web services (ISD-Lite and similar datasets behind a token).
//!
//! Every endpoint answers with XML where each child of the document root is a
//! record and the text-bearing elements under it are its fields.

use arrow::record_batch::RecordBatch;
use quick_xml::{events::Event, Reader};
use tracing::{debug, info};

use crate::{
    download::get_text,
    table::{build_inferred, Column, Row},
    Error, NoaaClient, Result,
};

fn token(client: &NoaaClient) -> Result<String> {
    client
        .config()
        .legacy_token
        .clone()
        .ok_or(Error::MissingToken)
}

async fn get_xml(client: &NoaaClient, path: &str) -> Result<RecordBatch> {
    let token = token(client)?;
    let url = format!("{}/{}", client.config().endpoints.legacy, path);
    debug!(%url, "legacy request");

    let params = [("output", "xml".to_string()), ("token", token)];
    let body = get_text(client.http(), &url, &params).await?;
    let table = xml_to_batch(&body)?;
    info!(path, rows = table.num_rows(), "legacy response decoded");

    Ok(table)
}

/// Variables offered by `dataset`.
pub async fn variables(client: &NoaaClient, dataset: &str) -> Result<RecordBatch> {
    get_xml(client, &format!("variables/{}", dataset)).await
}

/// Sites reporting to `dataset`.
pub async fn sites(client: &NoaaClient, dataset: &str) -> Result<RecordBatch> {
    get_xml(client, &format!("sites/{}", dataset)).await
}

/// Metadata for one site.
pub async fn site_info(client: &NoaaClient, dataset: &str, site: &str) -> Result<RecordBatch> {
    get_xml(client, &format!("sites/{}/{}", dataset, site)).await
}

/// Values of `variable` at `site` between `begin` and `end` (`YYYYMMDDhhmm` or
/// `YYYY-MM-DD`, whatever the dataset accepts).
pub async fn data(
    client: &NoaaClient,
    dataset: &str,
    site: &str,
    variable: &str,
    begin: &str,
    end: &str,
) -> Result<RecordBatch> {
    get_xml(
        client,
        &format!("values/{}/{}/{}/{}/{}", dataset, site, variable, begin, end),
    )
    .await
}

/// Flattens record-per-child XML into a table. Columns appear in the order
/// they are first seen; fields a record lacks are null.
pub fn xml_to_batch(xml: &str) -> Result<RecordBatch> {
    let records = parse_records(xml)?;

    let mut columns: Vec<Column> = Vec::new();
    for record in &records {
        for (name, _) in record {
            if !columns.iter().any(|c| &c.name == name) {
                columns.push(Column::new(name.clone()));
            }
        }
    }

    let rows: Vec<Row> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| {
                    record
                        .iter()
                        .find(|(name, _)| name == &c.name)
                        .map(|(_, value)| value.clone())
                        .filter(|v| !v.is_empty())
                })
                .collect()
        })
        .collect();

    build_inferred(&columns, &rows)
}

type Record = Vec<(String, String)>;

fn parse_records(xml: &str) -> Result<Vec<Record>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<Record> = None;
    // Open element names below the record.
    let mut path: Vec<String> = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match depth {
                    1 => {}
                    2 => current = Some(Vec::new()),
                    _ => path.push(name),
                }
            }
            Event::Empty(e) => {
                if depth >= 2 {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    if let Some(record) = current.as_mut() {
                        record.push((name, String::new()));
                    }
                } else if depth == 1 {
                    records.push(Vec::new());
                }
            }
            Event::Text(t) => {
                if let (Some(record), Some(name)) = (current.as_mut(), path.last()) {
                    record.push((name.clone(), t.unescape()?.trim().to_string()));
                }
            }
            Event::CData(c) => {
                if let (Some(record), Some(name)) = (current.as_mut(), path.last()) {
                    let text = String::from_utf8_lossy(&c.into_inner()).trim().to_string();
                    record.push((name.clone(), text));
                }
            }
            Event::End(_) => {
                match depth {
                    0 | 1 => {}
                    2 => {
                        if let Some(record) = current.take() {
                            records.push(record);
                        }
                    }
                    _ => {
                        path.pop();
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        table::{f64_value, string_value},
        test_support::{serve, test_client, Route},
        Config,
    };

    const VARIABLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<variables>
  <variable>
    <name>TMP</name>
    <description>Air temperature</description>
    <units>C</units>
  </variable>
  <variable>
    <name>DEW</name>
    <description>Dew point &amp; humidity</description>
  </variable>
</variables>"#;

    const VALUES: &str = r#"<values>
  <value><dateTime>2010-01-01T00:00</dateTime><value>-5.6</value><qc>1</qc></value>
  <value><dateTime>2010-01-01T01:00</dateTime><value>-6.1</value><qc/></value>
</values>"#;

    #[test]
    fn should_flatten_records() {
        let table = xml_to_batch(VARIABLES).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 3);
        assert_eq!(string_value(&table, "name", 0), Some("TMP".to_string()));
        assert_eq!(string_value(&table, "description", 1), Some("Dew point & humidity".to_string()));
        assert_eq!(string_value(&table, "units", 1), None);
    }

    #[test]
    fn should_infer_numeric_columns() {
        let table = xml_to_batch(VALUES).unwrap();

        assert_eq!(f64_value(&table, "value", 0), Some(-5.6));
        assert_eq!(f64_value(&table, "qc", 0), Some(1.0));
        assert_eq!(f64_value(&table, "qc", 1), None);
    }

    #[test]
    fn should_reject_malformed_xml() {
        assert!(xml_to_batch("<values><value><a>1</b></value></values>").is_err());
    }

    #[tokio::test]
    async fn should_require_token() {
        let client = NoaaClient::new(Config::default()).unwrap();

        let err = variables(&client, "isd").await.unwrap_err();

        assert!(matches!(err, Error::MissingToken));
    }

    #[tokio::test]
    async fn should_fetch_values_with_token() {
        let server = serve(vec![Route::ok("/legacy/values/isd/72201013874/TMP/201001010000/201001020000", VALUES)]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());

        let table = data(&client, "isd", "72201013874", "TMP", "201001010000", "201001020000")
            .await
            .unwrap();

        assert_eq!(table.num_rows(), 2);
        assert!(server.requests()[0].ends_with("?output=xml&token=test-token"));
    }

    #[tokio::test]
    async fn should_surface_server_error_body() {
        let server = serve(vec![Route::ok("/legacy/sites/isd", "Error: invalid token")]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());

        let err = sites(&client, "isd").await.unwrap_err();

        assert!(matches!(err, Error::Server(msg) if msg.contains("invalid token")));
    }
}
