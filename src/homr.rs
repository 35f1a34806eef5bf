//! Historical Observing Metadata Repository station search.

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{download::get_json, table, Error, NoaaClient, Result};

/// Search parameters. Unset fields are left out of the request.
#[derive(Debug, Clone, Default)]
pub struct HomrQuery {
    /// Station identifier, optionally prefixed with its type, e.g. `COOP:046742`.
    pub qid: Option<String>,
    /// How `qid` matches: `exact`, `starts` or `contains`.
    pub qid_mod: Option<String>,
    /// NCDC station id.
    pub station: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    pub country: Option<String>,
    pub name: Option<String>,
    pub name_mod: Option<String>,
    pub platform: Option<String>,
    /// Stations active on this date, `YYYY-MM-DD`.
    pub date: Option<String>,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    /// Return only station headers, no detailed metadata.
    pub headers_only: bool,
}

impl HomrQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let optional = [
            ("qid", &self.qid),
            ("qidMod", &self.qid_mod),
            ("station", &self.station),
            ("state", &self.state),
            ("county", &self.county),
            ("country", &self.country),
            ("name", &self.name),
            ("nameMod", &self.name_mod),
            ("platform", &self.platform),
            ("date", &self.date),
            ("begindate", &self.begin_date),
            ("enddate", &self.end_date),
        ];
        let mut params: Vec<(&'static str, String)> = optional
            .into_iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (key, v.clone())))
            .collect();
        if self.headers_only {
            params.push(("headersOnly", "true".to_string()));
        }
        params
    }

    fn is_empty(&self) -> bool {
        self.params().iter().all(|(key, _)| *key == "headersOnly")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    station_collection: StationCollection,
}

#[derive(Debug, Deserialize)]
struct StationCollection {
    #[serde(default)]
    stations: Vec<StationJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationJson {
    ncdc_stn_id: String,
    #[serde(default)]
    name: Option<NameJson>,
    #[serde(default)]
    header: Option<HeaderJson>,
    #[serde(default)]
    identifiers: Vec<Identifier>,
    #[serde(default)]
    names: Vec<StationName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NameJson {
    preferred_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderJson {
    preferred_name: Option<String>,
    #[serde(rename = "latitude_dec")]
    latitude: Option<String>,
    #[serde(rename = "longitude_dec")]
    longitude: Option<String>,
    por: Option<PeriodJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodJson {
    begin_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub id_type: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationName {
    pub name_type: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HomrStation {
    pub ncdc_id: String,
    pub preferred_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub begin_date: Option<String>,
    /// `Present` for stations still reporting.
    pub end_date: Option<String>,
    pub identifiers: Vec<Identifier>,
    pub names: Vec<StationName>,
}

impl HomrStation {
    /// First identifier of type `id_type`, e.g. `GHCND` or `WBAN`.
    pub fn identifier(&self, id_type: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|i| i.id_type.eq_ignore_ascii_case(id_type))
            .map(|i| i.id.as_str())
    }
}

impl From<StationJson> for HomrStation {
    fn from(s: StationJson) -> Self {
        let header = s.header;
        let preferred_name = header
            .as_ref()
            .and_then(|h| h.preferred_name.clone())
            .or_else(|| s.name.and_then(|n| n.preferred_name));
        let coord = |v: Option<&String>| v.and_then(|v| v.trim().parse::<f64>().ok());
        let por = header.as_ref().and_then(|h| h.por.as_ref());

        HomrStation {
            ncdc_id: s.ncdc_stn_id,
            preferred_name,
            latitude: coord(header.as_ref().and_then(|h| h.latitude.as_ref())),
            longitude: coord(header.as_ref().and_then(|h| h.longitude.as_ref())),
            begin_date: por.and_then(|p| p.begin_date.clone()),
            end_date: por.and_then(|p| p.end_date.clone()),
            identifiers: s.identifiers,
            names: s.names,
        }
    }
}

/// Searches HOMR. At least one criterion besides `headers_only` is required.
pub async fn search(client: &NoaaClient, query: &HomrQuery) -> Result<Vec<HomrStation>> {
    if query.is_empty() {
        return Err(Error::query("HOMR search needs at least one search criterion"));
    }

    let url = format!("{}/station/search", client.config().endpoints.homr);
    let params = query.params();
    debug!(%url, ?params, "HOMR search");

    let response: SearchResponse = get_json(client.http(), &url, &params).await?;
    let stations: Vec<HomrStation> = response
        .station_collection
        .stations
        .into_iter()
        .map(HomrStation::from)
        .collect();
    info!(stations = stations.len(), "HOMR search complete");

    Ok(stations)
}

fn identifier_summary(station: &HomrStation) -> String {
    station
        .identifiers
        .iter()
        .map(|i| format!("{}:{}", i.id_type, i.id))
        .collect::<Vec<_>>()
        .join(";")
}

/// One row per station; identifiers are flattened to `TYPE:id;TYPE:id`.
pub fn stations_to_batch(stations: &[HomrStation]) -> Result<RecordBatch> {
    let fields = vec![
        table::field("ncdc_id", DataType::Utf8, None),
        table::field("preferred_name", DataType::Utf8, None),
        table::field("latitude", DataType::Float64, Some("degrees_north")),
        table::field("longitude", DataType::Float64, Some("degrees_east")),
        table::field("begin_date", DataType::Utf8, None),
        table::field("end_date", DataType::Utf8, None),
        table::field("identifiers", DataType::Utf8, None),
    ];
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(stations.iter().map(|s| s.ncdc_id.as_str()))),
        Arc::new(stations.iter().map(|s| s.preferred_name.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.latitude).collect::<Float64Array>()),
        Arc::new(stations.iter().map(|s| s.longitude).collect::<Float64Array>()),
        Arc::new(stations.iter().map(|s| s.begin_date.as_deref()).collect::<StringArray>()),
        Arc::new(stations.iter().map(|s| s.end_date.as_deref()).collect::<StringArray>()),
        Arc::new(StringArray::from_iter_values(stations.iter().map(identifier_summary))),
    ];

    table::batch(fields, arrays)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        table::string_value,
        test_support::{serve, test_client, Route},
    };

    const RESPONSE: &str = r#"{
  "stationCollection": {
    "@timestamp": "2024-03-05T15:00:00.000",
    "stations": [
      {
        "ncdcStnId": "20002078",
        "name": {"preferredName": "CALEXICO 2 NE, CA"},
        "header": {
          "preferredName": "CALEXICO 2 NE, CA",
          "latitude_dec": "32.6764",
          "longitude_dec": "-115.4408",
          "por": {"beginDate": "1904-01-01T00:00:00.000", "endDate": "Present"}
        },
        "identifiers": [
          {"idType": "GHCND", "id": "USC00041244"},
          {"idType": "COOP", "id": "041244"}
        ],
        "names": [{"nameType": "COOP", "name": "CALEXICO 2 NE"}]
      },
      {
        "ncdcStnId": "30001234",
        "name": {"preferredName": "HEADER ONLY"}
      }
    ]
  }
}"#;

    #[test]
    fn should_map_query_params() {
        let query = HomrQuery {
            qid: Some("COOP:046742".to_string()),
            qid_mod: Some("exact".to_string()),
            state: Some("CA".to_string()),
            headers_only: true,
            ..Default::default()
        };

        assert_eq!(
            query.params(),
            vec![
                ("qid", "COOP:046742".to_string()),
                ("qidMod", "exact".to_string()),
                ("state", "CA".to_string()),
                ("headersOnly", "true".to_string()),
            ]
        );
        assert!(!query.is_empty());
        assert!(HomrQuery { headers_only: true, ..Default::default() }.is_empty());
    }

    #[test]
    fn should_decode_stations() {
        let response: SearchResponse = serde_json::from_str(RESPONSE).unwrap();
        let stations: Vec<HomrStation> = response
            .station_collection
            .stations
            .into_iter()
            .map(HomrStation::from)
            .collect();

        assert_eq!(stations.len(), 2);
        let calexico = &stations[0];
        assert_eq!(calexico.preferred_name.as_deref(), Some("CALEXICO 2 NE, CA"));
        assert_eq!(calexico.latitude, Some(32.6764));
        assert_eq!(calexico.end_date.as_deref(), Some("Present"));
        assert_eq!(calexico.identifier("ghcnd"), Some("USC00041244"));
        assert_eq!(calexico.names[0].name, "CALEXICO 2 NE");

        let bare = &stations[1];
        assert_eq!(bare.preferred_name.as_deref(), Some("HEADER ONLY"));
        assert_eq!(bare.latitude, None);
        assert!(bare.identifiers.is_empty());
    }

    #[tokio::test]
    async fn should_search_and_tabulate() {
        let server = serve(vec![Route::ok("/homr/station/search", RESPONSE)]).await;
        let dir = TempDir::new().unwrap();
        let client = test_client(&server, dir.path());
        let query = HomrQuery {
            state: Some("CA".to_string()),
            ..Default::default()
        };

        let stations = search(&client, &query).await.unwrap();
        let batch = stations_to_batch(&stations).unwrap();

        assert_eq!(server.requests()[0], "/homr/station/search?state=CA");
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(
            string_value(&batch, "identifiers", 0),
            Some("GHCND:USC00041244;COOP:041244".to_string())
        );
    }

    #[tokio::test]
    async fn should_refuse_empty_search() {
        let client = NoaaClient::new(crate::Config::default()).unwrap();
        let err = search(&client, &HomrQuery::default()).await.unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }
}
