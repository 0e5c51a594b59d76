//! Seams to the outside world: the spreadsheet, the ads reporting API and the notification sink.
//!
//! Each is a trait with a Google (or Discord) implementation and an in-memory implementation.
//! The in-memory implementations are compiled into the production binary as well so the whole
//! application can be run, top-to-bottom, without touching Google. See `Mode`.

mod ads;
mod ads_test_client;
mod discord;
mod notification;
mod sheet;
mod sheet_test_client;

use crate::model::AccountId;
use crate::{Config, Result};
use serde_json::Value;
use tracing::debug;

pub use ads_test_client::{TestAccount, TestReporting};
#[cfg(test)]
pub(crate) use ads_test_client::{campaign_row, customer_row};
pub use notification::{Notification, Severity, TestNotifier};
pub use sheet_test_client::TestSheet;

/// When this environment variable is set and non-empty, `Mode::Test` is used.
pub const TEST_MODE_ENV: &str = "ADS_SYNC_IN_TEST_MODE";

/// Whether the program talks to Google or to in-memory stand-ins.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Google,
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// A block of values to write, addressed in A1 notation, e.g. `'GOOGLE DATA'!C5`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SheetRange {
    pub range: String,
    pub values: Vec<Vec<String>>,
}

impl SheetRange {
    /// A range holding a single cell value.
    pub fn cell(range: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            range: range.into(),
            values: vec![vec![value.into()]],
        }
    }
}

/// Reads and writes cell values of a spreadsheet.
#[async_trait::async_trait]
pub trait Sheet: Send {
    /// Gets every row of `range`, e.g. `'GOOGLE DATA'`. Trailing empty cells of a row may be
    /// omitted, so rows can be ragged.
    async fn get(&mut self, range: &str) -> Result<Vec<Vec<String>>>;

    /// Writes all `data` in one batch, parsing values as if a user had typed them.
    async fn write_ranges(&mut self, data: &[SheetRange]) -> Result<()>;
}

/// Runs reporting queries against the ads platform.
#[async_trait::async_trait]
pub trait Reporting: Send + Sync {
    /// Runs `query` for `account` and returns every result row.
    async fn search(&self, account: &AccountId, query: &str) -> Result<Vec<Value>>;
}

/// Delivers operator notifications.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Creates the `Sheet` for `mode`.
pub async fn sheet(config: &Config, mode: Mode) -> Result<Box<dyn Sheet>> {
    debug!("Creating {mode:?} sheet client");
    Ok(match mode {
        Mode::Google => Box::new(sheet::GoogleSheet::new(config.clone()).await?),
        Mode::Test => Box::new(TestSheet::seeded()?),
    })
}

/// Creates the `Reporting` client for `mode`.
pub async fn reporting(config: &Config, mode: Mode) -> Result<Box<dyn Reporting>> {
    debug!("Creating {mode:?} reporting client");
    Ok(match mode {
        Mode::Google => Box::new(ads::GoogleAds::new(config).await?),
        Mode::Test => Box::new(TestReporting::seeded()),
    })
}

/// Creates the `Notifier` for `mode`.
pub fn notifier(config: &Config, mode: Mode) -> Result<Box<dyn Notifier>> {
    Ok(match mode {
        Mode::Google => Box::new(discord::DiscordNotifier::new(config.webhook_url())?),
        Mode::Test => Box::new(TestNotifier::default()),
    })
}
