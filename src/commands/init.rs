use crate::commands::Out;
use crate::{Config, NewConfig, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its `.secrets` subdirectory and an initial `config.json`.
///
/// # Arguments
/// - `home` - The directory that will be the root of data directory, e.g. `$HOME/ads-sync`
/// - `new` - The settings supplied on the command line.
///
/// # Errors
/// - Returns an error if any file operations fail or a setting is invalid.
pub async fn init(home: &Path, new: NewConfig) -> Result<Out<()>> {
    let config = Config::create(home, new)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Successfully created the ads-sync directory at '{}'. Put access tokens in '{}' or set \
        them in the environment before running a sync.",
        config.root().display(),
        config.secrets().display()
    )
    .into())
}
