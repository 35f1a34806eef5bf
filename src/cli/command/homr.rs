use anyhow::Result;
use noaadata::homr::{self, stations_to_batch, HomrQuery};

use super::Context;
use crate::cli::{create_spinner, HomrArgs};

impl From<&HomrArgs> for HomrQuery {
    fn from(args: &HomrArgs) -> Self {
        HomrQuery {
            qid: args.qid.clone(),
            qid_mod: args.qid_mod.clone(),
            station: args.station.clone(),
            state: args.state.clone(),
            county: args.county.clone(),
            country: args.country.clone(),
            name: args.name.clone(),
            begin_date: args.begin_date.clone(),
            end_date: args.end_date.clone(),
            headers_only: args.headers_only,
            ..Default::default()
        }
    }
}

pub async fn homr(ctx: &Context, args: &HomrArgs) -> Result<String> {
    let bar = create_spinner("Searching HOMR...".to_string());
    let stations = homr::search(&ctx.client, &HomrQuery::from(args)).await?;
    bar.finish_with_message(format!("{} stations", stations.len()));

    if stations.is_empty() {
        return Ok("No stations match".to_string());
    }

    Ok(format!(
        "File saved to `{}`",
        ctx.save(&stations_to_batch(&stations)?, "homr-stations")?
    ))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_map_arguments_to_query() {
        let args = HomrArgs {
            qid: Some("COOP:046742".to_string()),
            qid_mod: None,
            station: None,
            state: Some("CA".to_string()),
            county: None,
            country: None,
            name: None,
            begin_date: None,
            end_date: Some("2020-12-31".to_string()),
            headers_only: true,
        };
        let query = HomrQuery::from(&args);

        assert_eq!(query.qid.as_deref(), Some("COOP:046742"));
        assert_eq!(query.state.as_deref(), Some("CA"));
        assert_eq!(query.end_date.as_deref(), Some("2020-12-31"));
        assert!(query.headers_only);
        assert_eq!(query.platform, None);
    }
}
