use crate::api::Mode;
use crate::commands::Out;
use crate::model::SyncOutcome;
use crate::sync::Syncer;
use crate::{Config, Result};
use chrono::Local;

/// Runs one sync against the configured sheet.
pub async fn sync(config: Config, mode: Mode) -> Result<Out<SyncOutcome>> {
    let mut syncer = Syncer::from_config(&config, mode).await?;
    let outcome = syncer.run(Local::now().naive_local()).await?;
    let message = format!(
        "Sync completed: {} succeeded, {} failed, {} skipped",
        outcome.succeeded, outcome.failed, outcome.skipped
    );
    Ok(Out::new(message, outcome))
}
