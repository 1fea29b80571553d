//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use landroid_config::ConfigError;
use landroid_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Credentials ──────────────────────────────────────────────────
    #[error("Missing {field}")]
    #[diagnostic(
        code(landroid::no_credentials),
        help(
            "Set {env}, or add `{field}` to the config file.\n\
             All of WORX_EMAIL, WORX_PASSWORD and WORX_CLIENT_ID are required."
        )
    )]
    NoCredentials { field: String, env: String },

    #[error("Authentication failed: {reason}")]
    #[diagnostic(
        code(landroid::auth_failed),
        help("Check WORX_EMAIL, WORX_PASSWORD and WORX_CLIENT_ID.")
    )]
    AuthFailed { reason: String },

    // ── Directory ────────────────────────────────────────────────────
    #[error("No mower is registered to this account")]
    #[diagnostic(
        code(landroid::no_device),
        help("Register the mower in the Landroid app first.")
    )]
    NoDevice,

    #[error("Could not fetch {resource}: {reason}")]
    #[diagnostic(code(landroid::api_error))]
    Directory { resource: String, reason: String },

    // ── Broker ───────────────────────────────────────────────────────
    #[error("Mower broker unavailable: {reason}")]
    #[diagnostic(
        code(landroid::connection_failed),
        help("Run with -v to see the connection log.")
    )]
    ConnectionFailed { reason: String },

    #[error("The mower did not answer within {seconds}s")]
    #[diagnostic(
        code(landroid::timeout),
        help("The mower may be offline or out of Wi-Fi range. Increase --timeout to wait longer.")
    )]
    Timeout { seconds: u64 },

    #[error("Unexpected reply from the mower: {message}")]
    #[diagnostic(code(landroid::decode))]
    Decode { message: String },

    #[error("Messaging error: {message}")]
    #[diagnostic(code(landroid::transport))]
    Transport { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(landroid::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(landroid::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(landroid::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCredentials { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NoDevice => exit_code::NOT_FOUND,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Authentication { reason } => CliError::AuthFailed { reason },
            CoreError::InvalidToken { .. } => CliError::AuthFailed {
                reason: err.to_string(),
            },
            CoreError::DirectoryFetch { resource, reason } => CliError::Directory {
                resource: resource.into(),
                reason,
            },
            CoreError::EmptyDeviceList => CliError::NoDevice,
            CoreError::Connection { endpoint, reason } => CliError::ConnectionFailed {
                reason: format!("{endpoint}: {reason}"),
            },
            CoreError::SessionUnavailable { reason } => CliError::ConnectionFailed { reason },
            CoreError::RequestTimeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::PayloadDecode { message } => CliError::Decode { message },
            CoreError::Transport { message } => CliError::Transport { message },
            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing { field, env } => CliError::NoCredentials {
                field: field.into(),
                env: env.into(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
