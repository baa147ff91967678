//! Client settings loading.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. A settings file (`tollgate.toml`, `.yaml` or `.json` in the working
//!    directory, or an explicit path)
//! 3. `TOLLGATE_*` environment variables, with `__` separating nested keys
//!    (`TOLLGATE_BASE_URL`, `TOLLGATE_ENDPOINTS__REFRESH`)

use std::path::Path;

use config::{Config, Environment, File};
use tollgate_domain::{ClientSettings, DomainError};
use tracing::debug;

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A source could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The merged settings are invalid.
    #[error("invalid settings: {0}")]
    Invalid(#[from] DomainError),
}

/// Loads and validates client settings.
///
/// When `file` is `None`, an optional `tollgate.*` file in the working
/// directory is used if present.
///
/// # Errors
///
/// Returns an error if an explicit file is missing or malformed, a value
/// has the wrong type, or the result fails validation.
pub fn load_settings(file: Option<&Path>) -> Result<ClientSettings, SettingsError> {
    let file_source = match file {
        Some(path) => File::from(path.to_path_buf()).required(true),
        None => File::with_name("tollgate").required(false),
    };

    let settings: ClientSettings = Config::builder()
        .add_source(file_source)
        .add_source(
            Environment::with_prefix("TOLLGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    settings.validate()?;
    debug!(base_url = %settings.base_url, "settings loaded");
    Ok(settings)
}
