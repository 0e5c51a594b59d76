//! Configuration file handling for the sync service.
//!
//! The configuration file is stored at `$ADS_SYNC_HOME/config.json` and holds the KPI sheet URL,
//! the ads API settings, the webhook URL and an optional column mapping override. Access tokens
//! are never stored in `config.json`; they come from the environment or from files in
//! `$ADS_SYNC_HOME/.secrets`.

use crate::model::{AccountId, ColumnMapping};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

const APP_NAME: &str = "ads-sync";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CONFIG_JSON: &str = "config.json";
const SHEETS_TOKEN: &str = "sheets_token";
const ADS_TOKEN: &str = "ads_token";
const DEFAULT_SHEET_NAME: &str = "GOOGLE DATA";
const DEFAULT_API_VERSION: &str = "v17";

/// Environment variable holding the Google Sheets access token.
pub const SHEETS_TOKEN_ENV: &str = "ADS_SYNC_SHEETS_TOKEN";
/// Environment variable holding the Google Ads access token.
pub const ADS_TOKEN_ENV: &str = "ADS_SYNC_ADS_TOKEN";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$ADS_SYNC_HOME` and from there it loads `$ADS_SYNC_HOME/config.json`. It resolves
/// everything the sync needs up front: the spreadsheet id, the webhook URL and the column mapping.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
    webhook_url: Option<Url>,
    login_customer_id: Option<AccountId>,
    columns: ColumnMapping,
}

/// The values a user supplies to `init`.
#[derive(Debug, Clone, Default)]
pub struct NewConfig {
    pub sheet_url: String,
    pub sheet_name: Option<String>,
    pub webhook_url: Option<String>,
    pub developer_token: String,
    pub login_customer_id: Option<String>,
}

impl Config {
    /// Creates the home directory, its `.secrets` subdirectory and an initial `config.json`.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail or if `new` holds an invalid URL.
    pub async fn create(dir: impl Into<PathBuf>, new: NewConfig) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the ads-sync home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;
        let config_path = root.join(CONFIG_JSON);

        let config_file = ConfigFile {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: new.sheet_url,
            sheet_name: new.sheet_name.unwrap_or_else(default_sheet_name),
            webhook_url: new.webhook_url,
            developer_token: new.developer_token,
            login_customer_id: new.login_customer_id,
            api_version: default_api_version(),
            columns_path: None,
        };

        // Validate before anything is written.
        let config = Self::resolve(root, config_path, config_file).await?;
        config.config_file.save(&config.config_path).await?;
        Ok(config)
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load and validate the config file
    /// - load the column mapping override, if any
    /// - validate that the secrets directory exists
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The ads-sync home directory is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let config = Self::resolve(root, config_path, config_file).await?;
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    async fn resolve(root: PathBuf, config_path: PathBuf, config_file: ConfigFile) -> Result<Self> {
        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let webhook_url = match config_file.webhook_url.as_deref() {
            None | Some("") => None,
            Some(s) => Some(Url::parse(s).with_context(|| format!("Invalid webhook_url '{s}'"))?),
        };

        let login_customer_id = config_file
            .login_customer_id
            .as_deref()
            .map(AccountId::new)
            .filter(|id| !id.is_empty());

        let columns = match &config_file.columns_path {
            None => ColumnMapping::builtin()?,
            Some(p) => {
                let path = resolve_path(&root, p);
                debug!("Loading the column mapping from {}", path.display());
                let pairs: BTreeMap<String, String> = utils::deserialize(&path).await?;
                ColumnMapping::new(pairs)
                    .with_context(|| format!("Invalid column mapping in {}", path.display()))?
            }
        };

        Ok(Self {
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
            spreadsheet_id,
            webhook_url,
            login_customer_id,
            columns,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    /// The tab holding the KPI table.
    pub fn sheet_name(&self) -> &str {
        &self.config_file.sheet_name
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// `None` disables notifications.
    pub fn webhook_url(&self) -> Option<&Url> {
        self.webhook_url.as_ref()
    }

    pub fn developer_token(&self) -> &str {
        &self.config_file.developer_token
    }

    /// The manager account to act through, if any.
    pub fn login_customer_id(&self) -> Option<&AccountId> {
        self.login_customer_id.as_ref()
    }

    pub fn api_version(&self) -> &str {
        &self.config_file.api_version
    }

    pub fn columns(&self) -> &ColumnMapping {
        &self.columns
    }

    /// The Google Sheets access token, from `ADS_SYNC_SHEETS_TOKEN` or `.secrets/sheets_token`.
    pub async fn sheets_token(&self) -> Result<String> {
        self.token(SHEETS_TOKEN_ENV, SHEETS_TOKEN).await
    }

    /// The Google Ads access token, from `ADS_SYNC_ADS_TOKEN` or `.secrets/ads_token`.
    pub async fn ads_token(&self) -> Result<String> {
        self.token(ADS_TOKEN_ENV, ADS_TOKEN).await
    }

    async fn token(&self, env: &str, file: &str) -> Result<String> {
        if let Ok(value) = std::env::var(env) {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(value.to_string());
            }
        }
        let path = self.secrets.join(file);
        match utils::read_secret(&path).await? {
            Some(token) => Ok(token),
            None => bail!(
                "No access token found: set {env} or write the token to '{}'",
                path.display()
            ),
        }
    }
}

/// Returns `p` unchanged if it is absolute, otherwise resolves it against `root`.
fn resolve_path(root: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        return p.to_path_buf();
    }
    root.join(p)
}

fn default_sheet_name() -> String {
    DEFAULT_SHEET_NAME.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "ads-sync",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "sheet_name": "GOOGLE DATA",
///   "webhook_url": "https://discord.com/api/webhooks/1/abc",
///   "developer_token": "dev-token",
///   "login_customer_id": "111-222-3333",
///   "api_version": "v17",
///   "columns_path": "columns.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "ads-sync"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL to the KPI Google Sheet
    sheet_url: String,

    /// The tab holding the KPI table
    #[serde(default = "default_sheet_name")]
    sheet_name: String,

    /// Discord webhook for run notifications. Notifications are disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    webhook_url: Option<String>,

    /// Google Ads API developer token
    developer_token: String,

    /// Manager account id sent as `login-customer-id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    login_customer_id: Option<String>,

    /// Google Ads REST API version, e.g. `v17`
    #[serde(default = "default_api_version")]
    api_version: String,

    /// JSON file of `{ "<header>": "<metric key>" }` replacing the built-in column mapping
    /// (relative to the home directory or absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    columns_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;
        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
///
/// # Returns
/// The spreadsheet ID or an error if the URL format is invalid. Returns an empty string if the URL is empty.
fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    if url.is_empty() {
        return Ok(url);
    }

    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split('?')
                .next()
                .unwrap_or(id_part)
                .split('#')
                .next()
                .unwrap_or(id_part);
            return Ok(id);
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricKey;
    use tempfile::TempDir;

    const SHEET_URL: &str =
        "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";

    fn new_config() -> NewConfig {
        NewConfig {
            sheet_url: SHEET_URL.to_string(),
            developer_token: "dev-token".to_string(),
            webhook_url: Some("https://discord.com/api/webhooks/1/abc".to_string()),
            login_customer_id: Some("111-222-3333".to_string()),
            ..NewConfig::default()
        }
    }

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("ads_home");

        let config = Config::create(&home_dir, new_config()).await.unwrap();
        assert_eq!(SHEET_URL, config.sheet_url());
        assert_eq!(
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
            config.spreadsheet_id()
        );
        assert!(config.secrets().is_dir());
        assert!(config.config_path().is_file());

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.sheet_name(), "GOOGLE DATA");
        assert_eq!(loaded.api_version(), "v17");
        assert_eq!(loaded.developer_token(), "dev-token");
        assert_eq!(
            loaded.login_customer_id().map(AccountId::as_str),
            Some("1112223333")
        );
        assert_eq!(
            loaded.webhook_url().map(Url::as_str),
            Some("https://discord.com/api/webhooks/1/abc")
        );
        assert_eq!(loaded.columns(), &ColumnMapping::builtin().unwrap());
    }

    #[tokio::test]
    async fn test_config_create_rejects_bad_webhook() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("ads_home");
        let mut new = new_config();
        new.webhook_url = Some("not a url".to_string());
        let err = Config::create(&home_dir, new).await.unwrap_err();
        assert!(format!("{err:#}").contains("webhook_url"));
        assert!(!home_dir.join(CONFIG_JSON).exists());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "ads-sync",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/minimal",
            "developer_token": "t"
        }"#;
        utils::write(&path, json).await.unwrap();

        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.sheet_name, DEFAULT_SHEET_NAME);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert!(config.webhook_url.is_none());
        assert!(config.columns_path.is_none());
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "other-app",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/test",
            "developer_token": "t"
        }"#;
        utils::write(&path, json).await.unwrap();

        let err = ConfigFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_columns_override() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().to_path_buf();
        Config::create(&home_dir, new_config()).await.unwrap();

        utils::write(
            home_dir.join("columns.json"),
            r#"{"ID": "customer_id", " Spend ": "cost_last_month"}"#,
        )
        .await
        .unwrap();
        let path = home_dir.join(CONFIG_JSON);
        let mut file: ConfigFile = utils::deserialize(&path).await.unwrap();
        file.columns_path = Some(PathBuf::from("columns.json"));
        file.save(&path).await.unwrap();

        let config = Config::load(&home_dir).await.unwrap();
        assert_eq!(config.columns().len(), 2);
        assert_eq!(config.columns().get("Spend"), Some("cost_last_month".parse::<MetricKey>().unwrap()));
    }

    #[tokio::test]
    async fn test_columns_override_with_typo_fails() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().to_path_buf();
        Config::create(&home_dir, new_config()).await.unwrap();

        utils::write(home_dir.join("columns.json"), r#"{"Spend": "csot"}"#)
            .await
            .unwrap();
        let path = home_dir.join(CONFIG_JSON);
        let mut file: ConfigFile = utils::deserialize(&path).await.unwrap();
        file.columns_path = Some(PathBuf::from("columns.json"));
        file.save(&path).await.unwrap();

        let err = Config::load(&home_dir).await.unwrap_err();
        assert!(format!("{err:#}").contains("Invalid column mapping"));
    }

    #[tokio::test]
    async fn test_token_from_secrets_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::create(dir.path(), new_config()).await.unwrap();
        // The environment variables are not set in the test environment, so the file is used.
        utils::write(config.secrets().join(SHEETS_TOKEN), "ya29.sheet\n")
            .await
            .unwrap();
        if std::env::var(SHEETS_TOKEN_ENV).is_err() {
            assert_eq!(config.sheets_token().await.unwrap(), "ya29.sheet");
        }
        if std::env::var(ADS_TOKEN_ENV).is_err() {
            let err = config.ads_token().await.unwrap_err();
            assert!(err.to_string().contains(ADS_TOKEN_ENV));
        }
    }

    #[test]
    fn test_extract_spreadsheet_id() {
        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        let id = extract_spreadsheet_id(url).unwrap();
        assert_eq!(id, "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL");

        let url = "https://docs.google.com/spreadsheets/d/ABC123?foo=bar";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "ABC123");

        assert!(extract_spreadsheet_id("https://example.com/invalid").is_err());
        assert_eq!(extract_spreadsheet_id("").unwrap(), "");
    }
}
