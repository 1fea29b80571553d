// ── Runtime client configuration ──
//
// Describes how to reach the cloud and how to run requests. Never touches
// disk: the binary builds a `ClientConfig` and hands it in.

use std::time::Duration;

use landroid_api::{Credentials, Endpoints};
use serde::{Deserialize, Serialize};

/// How a device reply is matched to the request that triggered it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyMatching {
    /// The next message on the status topic is the reply.
    #[default]
    FirstMessage,
    /// Skip messages whose `cfg.id` differs from the sent command id.
    CommandId,
}

/// Configuration for one cloud client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    /// Timeout for each identity/product HTTP call.
    pub http_timeout: Duration,
    /// How long a request waits for the device to answer.
    pub request_timeout: Duration,
    /// MQTT keep-alive interval.
    pub keep_alive: Duration,
    /// Language code sent in every command envelope.
    pub language: String,
    pub reply_matching: ReplyMatching,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: Endpoints::default(),
            http_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(30),
            language: "de".into(),
            reply_matching: ReplyMatching::default(),
        }
    }
}
