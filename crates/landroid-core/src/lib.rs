// landroid-core: Session, caching, and request/response layer over landroid-api.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod model;
pub mod session;
pub mod transport;

mod cache;
mod request;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::LandroidClient;
pub use config::{ClientConfig, ReplyMatching};
pub use connection::{ConnectionConfig, CustomAuthorizer};
pub use error::CoreError;
pub use model::{CommandEnvelope, MowerActivity, MowerError, MowerStatus};
pub use session::SessionState;
pub use transport::{
    InMemoryTransport, MessagingTransport, MqttTransport, QoS, TransportError, TransportEvent,
};

// Types consumers need to build a `ClientConfig` or read directory data.
pub use landroid_api::{
    AccessToken, Credentials, DeviceRecord, Endpoints, MqttTopics, UserProfile,
};
