use anyhow::Result;
use noaadata::legacy;

use super::Context;
use crate::cli::{create_spinner, LegacyCommands};

pub async fn legacy(ctx: &Context, command: &LegacyCommands) -> Result<String> {
    let bar = create_spinner("Querying NCDC legacy services...".to_string());
    let client = &ctx.client;

    let (batch, stem) = match command {
        LegacyCommands::Variables { dataset } => {
            (legacy::variables(client, dataset).await?, format!("legacy-{}-variables", dataset))
        }
        LegacyCommands::Sites { dataset } => (legacy::sites(client, dataset).await?, format!("legacy-{}-sites", dataset)),
        LegacyCommands::SiteInfo { dataset, site } => (
            legacy::site_info(client, dataset, site).await?,
            format!("legacy-{}-{}", dataset, site),
        ),
        LegacyCommands::Data {
            dataset,
            site,
            variable,
            begin,
            end,
        } => (
            legacy::data(client, dataset, site, variable, begin, end).await?,
            format!("legacy-{}-{}-{}", dataset, site, variable),
        ),
    };
    bar.finish_with_message(format!("{} rows", batch.num_rows()));

    Ok(format!("File saved to `{}`", ctx.save(&batch, &stem)?))
}
