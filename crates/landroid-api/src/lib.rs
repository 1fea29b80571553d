// landroid-api: Async Rust client for the Worx Landroid cloud (identity + product APIs)

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{AccessToken, Credentials};
pub use client::{CloudClient, Endpoints};
pub use error::Error;
pub use models::{DeviceRecord, MqttTopics, UserProfile};
