// ── In-memory transport ──
//
// Loopback broker with the same routing rules as the MQTT transport.
// Records every operation so tests can assert on ordering, and can answer
// publishes through a responder closure to play the device.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use super::{
    InboundMessage, MessagingTransport, QoS, Subscription, TransportError, TransportEvent,
};
use crate::connection::ConnectionConfig;

const EVENT_CHANNEL_SIZE: usize = 16;

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    Connect { client_id: String, endpoint: String },
    Subscribe { topic: String },
    Publish { topic: String, payload: Bytes },
    Unsubscribe { topic: String },
    Disconnect,
}

/// Replies produced for a publish: `(topic, payload)` pairs delivered in order.
pub type Responder = dyn Fn(&str, &[u8]) -> Vec<(String, Bytes)> + Send + Sync;

/// Loopback transport.
pub struct InMemoryTransport {
    routes: DashMap<String, Vec<mpsc::UnboundedSender<InboundMessage>>>,
    ops: Mutex<Vec<TransportOp>>,
    connected: Mutex<bool>,
    connect_error: Option<String>,
    drop_after_connect: Option<String>,
    publish_error: Option<String>,
    responder: Option<Arc<Responder>>,
    events: broadcast::Sender<TransportEvent>,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            routes: DashMap::new(),
            ops: Mutex::new(Vec::new()),
            connected: Mutex::new(false),
            connect_error: None,
            drop_after_connect: None,
            publish_error: None,
            responder: None,
            events,
        }
    }

    /// Answer every publish with the result of `responder`.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str, &[u8]) -> Vec<(String, Bytes)> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Reply to every publish on `command_in` with `reply` on `command_out`.
    pub fn with_device(
        self,
        command_in: impl Into<String>,
        command_out: impl Into<String>,
        reply: impl Into<Bytes>,
    ) -> Self {
        let command_in = command_in.into();
        let command_out = command_out.into();
        let reply = reply.into();
        self.with_responder(move |topic, _| {
            if topic == command_in {
                vec![(command_out.clone(), reply.clone())]
            } else {
                Vec::new()
            }
        })
    }

    /// Make `connect` fail with `reason`.
    pub fn failing_connect(mut self, reason: impl Into<String>) -> Self {
        self.connect_error = Some(reason.into());
        self
    }

    /// Accept the connection, then lose it with `reason` before `connect`
    /// returns.
    pub fn dropping_after_connect(mut self, reason: impl Into<String>) -> Self {
        self.drop_after_connect = Some(reason.into());
        self
    }

    /// Make `publish` fail with `reason`.
    pub fn failing_publish(mut self, reason: impl Into<String>) -> Self {
        self.publish_error = Some(reason.into());
        self
    }

    /// Deliver a message as if the broker had sent it.
    pub fn inject(&self, topic: &str, payload: impl Into<Bytes>) {
        self.route(InboundMessage {
            topic: topic.to_owned(),
            payload: payload.into(),
        });
    }

    /// Emit a lifecycle event.
    pub fn emit(&self, event: TransportEvent) {
        if event == TransportEvent::Disconnected {
            *self.connected.lock().unwrap_or_else(PoisonError::into_inner) = false;
        }
        let _ = self.events.send(event);
    }

    /// Every call made so far, in order.
    pub fn operations(&self) -> Vec<TransportOp> {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of live handlers on `topic`.
    pub fn handler_count(&self, topic: &str) -> usize {
        self.routes.get(topic).map_or(0, |h| h.len())
    }

    fn record(&self, op: TransportOp) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if *self.connected.lock().unwrap_or_else(PoisonError::into_inner) {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn route(&self, message: InboundMessage) {
        if let Some(mut handlers) = self.routes.get_mut(&message.topic) {
            handlers.retain(|tx| tx.send(message.clone()).is_ok());
        }
    }
}

#[async_trait::async_trait]
impl MessagingTransport for InMemoryTransport {
    async fn connect(&self, config: &ConnectionConfig) -> Result<(), TransportError> {
        self.record(TransportOp::Connect {
            client_id: config.client_id.clone(),
            endpoint: config.endpoint.clone(),
        });
        if let Some(reason) = &self.connect_error {
            let _ = self.events.send(TransportEvent::Error(reason.clone()));
            return Err(TransportError::Connect {
                reason: reason.clone(),
            });
        }
        *self.connected.lock().unwrap_or_else(PoisonError::into_inner) = true;
        let _ = self.events.send(TransportEvent::Connected);
        if let Some(reason) = &self.drop_after_connect {
            let _ = self.events.send(TransportEvent::Error(reason.clone()));
            self.emit(TransportEvent::Disconnected);
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _qos: QoS) -> Result<Subscription, TransportError> {
        self.ensure_connected()?;
        self.record(TransportOp::Subscribe {
            topic: topic.to_owned(),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.entry(topic.to_owned()).or_default().push(tx);
        Ok(Subscription::new(topic, rx))
    }

    async fn publish(&self, topic: &str, payload: Bytes, _qos: QoS) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.record(TransportOp::Publish {
            topic: topic.to_owned(),
            payload: payload.clone(),
        });
        if let Some(reason) = &self.publish_error {
            return Err(TransportError::Client(reason.clone()));
        }
        let replies = self
            .responder
            .as_ref()
            .map(|respond| respond(topic, &payload))
            .unwrap_or_default();
        for (reply_topic, reply_payload) in replies {
            self.inject(&reply_topic, reply_payload);
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.record(TransportOp::Unsubscribe {
            topic: topic.to_owned(),
        });
        self.routes.remove(topic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.record(TransportOp::Disconnect);
        self.routes.clear();
        self.emit(TransportEvent::Disconnected);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}
