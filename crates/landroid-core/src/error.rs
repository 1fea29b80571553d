// ── Core error types ──
//
// User-facing errors from landroid-core. Consumers never see HTTP status
// codes or MQTT packet details directly. The `From` impls translate the
// lower layers into these variants.

use thiserror::Error;

use crate::transport::TransportError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Credentials and directory ────────────────────────────────────
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("Failed to fetch {resource}: {reason}")]
    DirectoryFetch {
        resource: &'static str,
        reason: String,
    },

    #[error("No devices are registered to this account")]
    EmptyDeviceList,

    #[error("Access token has {segments} segment(s), expected 3")]
    InvalidToken { segments: usize },

    // ── Session ──────────────────────────────────────────────────────
    #[error("Cannot connect to broker at {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("Session unavailable: {reason}")]
    SessionUnavailable { reason: String },

    // ── Request/response ─────────────────────────────────────────────
    #[error("Device reply could not be decoded: {message}")]
    PayloadDecode { message: String },

    #[error("No reply from device within {timeout_secs}s")]
    RequestTimeout { timeout_secs: u64 },

    #[error("Messaging transport error: {message}")]
    Transport { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Wrap an API failure for a directory resource, whatever its status.
    pub(crate) fn directory(resource: &'static str, err: &landroid_api::Error) -> Self {
        Self::DirectoryFetch {
            resource,
            reason: err.to_string(),
        }
    }
}

// ── Conversion from lower layers ─────────────────────────────────────

impl From<landroid_api::Error> for CoreError {
    fn from(err: landroid_api::Error) -> Self {
        match err {
            landroid_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            landroid_api::Error::InvalidHeader(msg) | landroid_api::Error::Tls(msg) => {
                CoreError::Config { message: msg }
            }
            other => CoreError::Authentication {
                reason: other.to_string(),
            },
        }
    }
}

impl From<TransportError> for CoreError {
    fn from(err: TransportError) -> Self {
        CoreError::Transport {
            message: err.to_string(),
        }
    }
}
