use crate::api::{Mode, Notification, Notifier, Reporting, Sheet};
use crate::model::{ColumnMapping, PeriodRanges, SyncOutcome};
use crate::sync::aggregator::Aggregator;
use crate::sync::row_updater::RowUpdater;
use crate::sync::sheet_index::SheetIndex;
use crate::{Config, Result};
use chrono::NaiveDateTime;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Drives one sync run: reads the KPI table, refreshes every eligible account's row and reports
/// the outcome to the notification channel.
pub struct Syncer {
    sheet: Box<dyn Sheet>,
    reporting: Box<dyn Reporting>,
    notifier: Box<dyn Notifier>,
    sheet_name: String,
    columns: ColumnMapping,
}

impl Syncer {
    pub fn new(
        sheet: Box<dyn Sheet>,
        reporting: Box<dyn Reporting>,
        notifier: Box<dyn Notifier>,
        sheet_name: impl Into<String>,
        columns: ColumnMapping,
    ) -> Self {
        Self {
            sheet,
            reporting,
            notifier,
            sheet_name: sheet_name.into(),
            columns,
        }
    }

    /// Creates the clients for `mode` from `config`.
    pub async fn from_config(config: &Config, mode: Mode) -> Result<Self> {
        Ok(Self::new(
            crate::api::sheet(config, mode).await?,
            crate::api::reporting(config, mode).await?,
            crate::api::notifier(config, mode)?,
            config.sheet_name(),
            config.columns().clone(),
        ))
    }

    /// Runs one sync with every date window computed from `now`.
    ///
    /// Account failures are counted in the outcome and do not stop the run. An error is returned
    /// only when the table cannot be read or has no account id column. A summary notification is
    /// sent either way.
    pub async fn run(&mut self, now: NaiveDateTime) -> Result<SyncOutcome> {
        let span = info_span!("sync", run_id = %Uuid::new_v4());
        async move {
            let mut outcome = SyncOutcome::default();
            let result = self.process(now, &mut outcome).await;
            if let Err(e) = &result {
                error!("Sync failed: {e:#}");
                notify(self.notifier.as_ref(), &Notification::fatal(format!("{e:#}"))).await;
            }
            if outcome.degraded_fields > 0 {
                warn!(
                    "{} fields could not be read and were written as 0",
                    outcome.degraded_fields
                );
            }
            info!(
                "Sync finished: {} succeeded, {} failed, {} skipped",
                outcome.succeeded, outcome.failed, outcome.skipped
            );
            notify(self.notifier.as_ref(), &Notification::summary(&outcome)).await;
            result.map(|_| outcome)
        }
        .instrument(span)
        .await
    }

    async fn process(&mut self, now: NaiveDateTime, outcome: &mut SyncOutcome) -> Result<()> {
        let index = SheetIndex::load(self.sheet.as_mut(), &self.sheet_name).await?;
        let accounts = index.eligible_accounts()?;
        if accounts.is_empty() {
            warn!("No eligible accounts found in '{}'", self.sheet_name);
            return Ok(());
        }
        info!("Syncing {} accounts", accounts.len());

        let ranges = PeriodRanges::compute(now.date());
        for (period, range) in ranges.iter() {
            debug!("{period}: {range}");
        }

        let mut aggregator = Aggregator::new(self.reporting.as_ref());
        let updater = RowUpdater::new(&self.sheet_name, &self.columns);
        for account in &accounts {
            let Some(row) = index.locate_row(account)? else {
                warn!("Account {account} not found in the sheet, skipping");
                outcome.record_skip();
                continue;
            };
            debug!("Processing {account} at row {}", row + 1);

            let result = match aggregator.aggregate(account, &ranges, now).await {
                Ok(record) => {
                    let writes = updater.build_updates(row, index.headers(), &record);
                    updater.apply(self.sheet.as_mut(), &writes).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    info!("Updated {account}");
                    outcome.record_success();
                }
                Err(e) => {
                    let message = format!("{e:#}");
                    let formatted = outcome.record_failure(account, &message);
                    error!("{formatted}");
                    let notification = Notification::account_failure(account, &message);
                    notify(self.notifier.as_ref(), &notification).await;
                }
            }
            outcome.degraded_fields = aggregator.degraded();
        }
        Ok(())
    }
}

/// Delivery problems never affect the run.
async fn notify(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(e) = notifier.notify(notification).await {
        warn!("Unable to send notification '{}': {e:#}", notification.title);
    }
}
