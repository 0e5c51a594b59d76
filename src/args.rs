//! These structs provide the CLI interface for the ads-sync CLI.

use crate::NewConfig;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// ads-sync: Keeps a KPI Google Sheet up to date with Google Ads performance metrics.
///
/// Every account marked as under management in the KPI sheet gets its row refreshed with the
/// month-to-date, last month, two months ago and year-ago figures, recent daily spend and the
/// current daily budget. Results are reported to a Discord channel when a webhook is configured.
///
/// Access tokens are not obtained by this program. Provide them through ADS_SYNC_SHEETS_TOKEN and
/// ADS_SYNC_ADS_TOKEN, or as files in the .secrets directory of the ads-sync home.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and its config.json.
    ///
    /// Run this first. You need the URL of the KPI sheet and a Google Ads developer token. The
    /// directory defaults to $HOME/ads-sync; pass --home to put it somewhere else.
    Init(InitArgs),
    /// Run one sync now.
    Sync,
    /// Serve the HTTP run trigger (GET|POST /sync-sheets, GET /health).
    Serve(ServeArgs),
    /// Print the reporting windows a sync would use.
    Periods(PeriodsArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and secrets are held. Defaults to ~/ads-sync
    #[arg(long, env = "ADS_SYNC_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `ads-sync init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to the KPI Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The Google Ads API developer token.
    #[arg(long)]
    developer_token: String,

    /// The tab holding the KPI table. Defaults to "GOOGLE DATA".
    #[arg(long)]
    sheet_name: Option<String>,

    /// A Discord webhook URL for run notifications.
    #[arg(long)]
    webhook_url: Option<String>,

    /// The manager account to act through, e.g. 123-456-7890.
    #[arg(long)]
    login_customer_id: Option<String>,
}

impl InitArgs {
    pub fn new(sheet_url: impl Into<String>, developer_token: impl Into<String>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            developer_token: developer_token.into(),
            sheet_name: None,
            webhook_url: None,
            login_customer_id: None,
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    /// The settings to create the config with.
    pub fn new_config(&self) -> NewConfig {
        NewConfig {
            sheet_url: self.sheet_url.clone(),
            sheet_name: self.sheet_name.clone(),
            webhook_url: self.webhook_url.clone(),
            developer_token: self.developer_token.clone(),
            login_customer_id: self.login_customer_id.clone(),
        }
    }
}

/// (Not shown): Args for the `ads-sync serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
}

impl ServeArgs {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// (Not shown): Args for the `ads-sync periods` command.
#[derive(Debug, Parser, Clone)]
pub struct PeriodsArgs {
    /// Compute the windows as if today were this date (YYYY-MM-DD).
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl PeriodsArgs {
    pub fn new(date: Option<NaiveDate>) -> Self {
        Self { date }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("ads-sync"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or ADS_SYNC_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("ads-sync")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
