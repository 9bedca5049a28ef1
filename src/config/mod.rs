//! Configuration loading: TOML file first, environment variables on top.
//!
//! Lookup order for the file is `--config`, then `KEIKO_CONFIG`, then
//! `./config/default.toml`, then `<platform config dir>/keiko/config.toml`.
//! A missing file is fine as long as the environment supplies the required
//! values; a file that exists but cannot be parsed is an error.

pub mod schema;

pub use schema::{
    AuthorizeConfig, BackendConfig, Config, GatewayConfig, IdentityConfig, MessengerConfig,
    PersonaConfig, WebhookConfig,
};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const CONFIG_PATH_ENV: &str = "KEIKO_CONFIG";
const LOCAL_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing config values: {}", .0.join(", "))]
    MissingValues(Vec<&'static str>),
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
}

impl Config {
    /// Load, overlay the process environment, and validate.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config = Self::load_unchecked(explicit_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`] without the required-value check. Used by
    /// commands that never talk to the platform.
    pub fn load_unchecked(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("No config file found; using defaults and environment");
                Self::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Overlay values from `lookup` (normally `std::env::var`). Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("MESSENGER_APP_SECRET") {
            self.messenger.app_secret = v;
        }
        if let Some(v) = get("MESSENGER_VALIDATION_TOKEN") {
            self.messenger.validation_token = v;
        }
        if let Some(v) = get("MESSENGER_PAGE_ACCESS_TOKEN") {
            self.messenger.page_access_token = v;
        }
        if let Some(v) = get("MESSENGER_SEND_API_URL") {
            self.messenger.send_api_url = v;
        }
        if let Some(v) = get("SERVER_URL") {
            self.gateway.server_url = v;
        }
        if let Some(v) = get("KEIKO_HOST") {
            self.gateway.host = v;
        }
        match get("PORT").map(|v| v.parse::<u16>()) {
            Some(Ok(port)) => self.gateway.port = port,
            Some(Err(e)) => tracing::warn!("Ignoring invalid PORT value: {e}"),
            None => {}
        }
        if let Some(v) = get("KEIKO_ALLOW_UNSIGNED_WEBHOOKS") {
            self.webhook.allow_unsigned =
                matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = get("KEIKO_BACKEND_URL") {
            self.backend.url = v;
        }
        if let Some(v) = get("KEIKO_BACKEND_BOT_ID") {
            self.backend.bot_id = v;
        }
        if let Some(v) = get("KEIKO_DATABASE_PATH") {
            self.identity.database_path = PathBuf::from(v);
        }
    }

    /// Every required value must be present; all missing ones are reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("messenger.app_secret", &self.messenger.app_secret),
            ("messenger.validation_token", &self.messenger.validation_token),
            ("messenger.page_access_token", &self.messenger.page_access_token),
            ("gateway.server_url", &self.gateway.server_url),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingValues(missing))
        }
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Some(path) = std::env::var(CONFIG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(ConfigError::NotFound(path).into());
        }
        return Ok(Some(path));
    }

    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Ok(Some(local));
    }

    Ok(directories::ProjectDirs::from("", "", "keiko")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .filter(|path| path.exists()))
}
