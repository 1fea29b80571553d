//! Configuration for the Landroid CLI.
//!
//! Optional TOML file, `WORX_*` environment overrides, credential
//! resolution, and translation to `landroid_core::ClientConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use landroid_core::{ClientConfig, Credentials, Endpoints, ReplyMatching};

/// Prefix of every environment variable read by the loader.
pub const ENV_PREFIX: &str = "WORX_";

const PASSWORD_ENV: &str = "WORX_PASSWORD";
const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {field}: set {env} or add `{field}` to the config file")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config struct ───────────────────────────────────────────────────

/// Settings for one account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Account e-mail.
    pub email: Option<String>,

    /// Account password (plaintext; prefer `WORX_PASSWORD`).
    pub password: Option<String>,

    /// OAuth client id of the integration.
    pub client_id: Option<String>,

    /// Language sent with device commands.
    #[serde(default = "default_language")]
    pub language: String,

    /// Seconds to wait for a device reply.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Seconds allowed for each HTTP call.
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,

    /// MQTT keep-alive in seconds.
    #[serde(default = "default_timeout")]
    pub keep_alive_secs: u64,

    #[serde(default)]
    pub reply_matching: ReplyMatching,

    /// Override for the OAuth token endpoint.
    pub auth_url: Option<Url>,

    /// Override for the product API base URL.
    pub api_url: Option<Url>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            client_id: None,
            language: default_language(),
            request_timeout_secs: default_timeout(),
            http_timeout_secs: default_timeout(),
            keep_alive_secs: default_timeout(),
            reply_matching: ReplyMatching::default(),
            auth_url: None,
            api_url: None,
        }
    }
}

fn default_language() -> String {
    "de".into()
}
fn default_timeout() -> u64 {
    30
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "worx", "landroid").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("landroid");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults, then the config file, then `WORX_*` variables.
///
/// An explicit `path` must exist; the default path is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => return Err(ConfigError::FileNotFound(p.to_path_buf())),
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    // The password is read raw below; figment would coerce numeric ones.
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["password"]));

    let mut config: Config = figment.extract()?;
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        config.password = Some(password);
    }
    Ok(config)
}

impl Config {
    /// Account credentials; every part is required.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let email = required(self.email.as_deref(), "email", "WORX_EMAIL")?;
        let password = required(self.password.as_deref(), "password", PASSWORD_ENV)?;
        let client_id = required(self.client_id.as_deref(), "client_id", "WORX_CLIENT_ID")?;
        Ok(Credentials::new(
            email,
            SecretString::from(password.to_owned()),
            client_id,
        ))
    }

    /// Build the runtime client configuration.
    pub fn to_client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut client = ClientConfig::new(self.credentials()?);

        client.request_timeout = non_zero_secs("request_timeout_secs", self.request_timeout_secs)?;
        client.http_timeout = non_zero_secs("http_timeout_secs", self.http_timeout_secs)?;
        client.keep_alive = non_zero_secs("keep_alive_secs", self.keep_alive_secs)?;
        client.language.clone_from(&self.language);
        client.reply_matching = self.reply_matching;

        if self.auth_url.is_some() || self.api_url.is_some() {
            let defaults = Endpoints::default();
            client.endpoints = Endpoints::new(
                self.auth_url.clone().unwrap_or(defaults.auth_url),
                self.api_url.clone().unwrap_or(defaults.api_base),
            );
        }
        Ok(client)
    }

    /// Copy with the password masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            password: self.password.as_ref().map(|_| REDACTED.into()),
            ..self.clone()
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
    env: &'static str,
) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { field, env })
}

fn non_zero_secs(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}
