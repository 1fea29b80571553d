// ── Messaging transport abstraction ──
//
// The session and request layers talk to the broker only through
// `MessagingTransport`. `MqttTransport` is the production implementation;
// `InMemoryTransport` is a loopback broker for tests and offline runs.

pub mod memory;
pub mod mqtt;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::connection::ConnectionConfig;

pub use memory::{InMemoryTransport, TransportOp};
pub use mqtt::MqttTransport;

/// Delivery guarantee for a subscribe or publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
}

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Error(String),
    Disconnected,
}

/// Handler channel for one topic, returned once the broker acknowledged
/// the subscription.
///
/// Dropping it detaches the handler; the transport prunes it on the next
/// message routed to the topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, rx: mpsc::UnboundedReceiver<InboundMessage>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message on the topic; `None` once the transport shut down.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }
}

/// Errors raised by a transport implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("connect failed: {reason}")]
    Connect { reason: String },

    #[error("subscription to {topic} was rejected by the broker")]
    SubscribeRejected { topic: String },

    #[error("connection closed")]
    Closed,

    #[error("timed out waiting for the broker")]
    Timeout,

    #[error("{0}")]
    Client(String),
}

/// Publish/subscribe session with a broker.
#[async_trait::async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Open the session and wait for the broker to accept it.
    async fn connect(&self, config: &ConnectionConfig) -> Result<(), TransportError>;

    /// Subscribe and wait for the broker's acknowledgement.
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<Subscription, TransportError>;

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), TransportError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Lifecycle event stream. Each call returns a fresh receiver.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}
