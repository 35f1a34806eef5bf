use anyhow::Result;
use noaadata::storms::{self, Basin, StormFilter};

use super::Context;
use crate::cli::create_spinner;

pub async fn storms(ctx: &Context, basin: Basin, sid: Option<String>, season: Option<i32>) -> Result<String> {
    let mut stem = format!("ibtracs-{}", basin);
    if let Some(season) = season {
        stem.push_str(&format!("-{}", season));
    }
    if let Some(sid) = &sid {
        stem.push_str(&format!("-{}", sid));
    }

    let bar = create_spinner(format!("Fetching {} storm tracks...", basin));
    let batch = storms::storms(&ctx.client, basin, &StormFilter { sid, season }, ctx.refresh).await?;
    bar.finish_with_message(format!("{} track points", batch.num_rows()));

    Ok(format!("File saved to `{}`", ctx.save(&batch, &stem)?))
}
