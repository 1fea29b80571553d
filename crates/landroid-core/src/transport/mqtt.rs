// ── MQTT transport ──
//
// rumqttc client over TLS (ALPN `mqtt`, port 443). The event loop runs as
// a spawned task: it resolves SubAck waiters, routes publishes to the
// per-topic handler channels, and reports lifecycle events. It stops on
// the first connection error; there is no reconnect.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use rumqttc::tokio_rustls::rustls::{ClientConfig as TlsClientConfig, RootCertStore};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, SubscribeReasonCode,
    TlsConfiguration, Transport,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{
    InboundMessage, MessagingTransport, QoS, Subscription, TransportError, TransportEvent,
};
use crate::connection::{ALPN_PROTOCOL, ConnectionConfig};

const REQUEST_CHANNEL_SIZE: usize = 10;
const EVENT_CHANNEL_SIZE: usize = 16;
const BROKER_ACK_TIMEOUT: Duration = Duration::from_secs(30);
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

type Handlers = Vec<mpsc::UnboundedSender<InboundMessage>>;
type AckSender = oneshot::Sender<bool>;

/// SubAck waiters. A waiter is queued when `subscribe` is called and bound
/// to its packet id once the event loop reports the outgoing SUBSCRIBE.
#[derive(Default)]
struct SubscribeWaiters {
    next_id: u64,
    unsent: VecDeque<(u64, AckSender)>,
    in_flight: HashMap<u16, (u64, AckSender)>,
}

/// State shared between the transport handle and its event loop task.
struct Shared {
    routes: DashMap<String, Handlers>,
    subacks: Mutex<SubscribeWaiters>,
    events: broadcast::Sender<TransportEvent>,
}

impl Shared {
    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn route(&self, message: InboundMessage) {
        let Some(mut handlers) = self.routes.get_mut(&message.topic) else {
            trace!(topic = %message.topic, "no handler for message");
            return;
        };
        handlers.retain(|tx| tx.send(message.clone()).is_ok());
        debug!(topic = %message.topic, handlers = handlers.len(), "message routed");
    }

    fn waiters(&self) -> std::sync::MutexGuard<'_, SubscribeWaiters> {
        self.subacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a waiter; the returned id is used to withdraw it.
    fn register_subscribe(&self, tx: AckSender) -> u64 {
        let mut waiters = self.waiters();
        waiters.next_id += 1;
        let id = waiters.next_id;
        waiters.unsent.push_back((id, tx));
        id
    }

    /// SUBSCRIBE packets leave in request order.
    fn subscribe_sent(&self, pkid: u16) {
        let mut waiters = self.waiters();
        if let Some(waiter) = waiters.unsent.pop_front() {
            waiters.in_flight.insert(pkid, waiter);
        }
    }

    fn subscribe_acked(&self, pkid: u16, accepted: bool) {
        let waiter = self.waiters().in_flight.remove(&pkid);
        match waiter {
            Some((_, tx)) => {
                let _ = tx.send(accepted);
            }
            None => trace!(pkid, "suback without waiter"),
        }
    }

    fn withdraw_subscribe(&self, id: u64) {
        let mut waiters = self.waiters();
        waiters.unsent.retain(|(waiter, _)| *waiter != id);
        waiters.in_flight.retain(|_, (waiter, _)| *waiter != id);
    }

    fn drop_subscribe_waiters(&self) {
        let mut waiters = self.waiters();
        waiters.unsent.clear();
        waiters.in_flight.clear();
    }
}

/// Production transport backed by `rumqttc`.
pub struct MqttTransport {
    client: Mutex<Option<AsyncClient>>,
    task: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            client: Mutex::new(None),
            task: Mutex::new(None),
            shared: Arc::new(Shared {
                routes: DashMap::new(),
                subacks: Mutex::new(SubscribeWaiters::default()),
                events,
            }),
            cancel: CancellationToken::new(),
        }
    }

    fn client(&self) -> Result<AsyncClient, TransportError> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::NotConnected)
    }
}

fn mqtt_options(config: &ConnectionConfig) -> MqttOptions {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut tls = TlsClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    tls.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let mut options = MqttOptions::new(&config.client_id, &config.endpoint, config.port);
    options
        .set_keep_alive(config.keep_alive)
        .set_clean_session(config.clean_session)
        .set_credentials(config.username(), "")
        .set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(
            Arc::new(tls),
        )));
    options
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
    }
}

fn client_error(err: &rumqttc::ClientError) -> TransportError {
    TransportError::Client(err.to_string())
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let mut ready = Some(ready);

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
                shared.emit(TransportEvent::Connected);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                shared.route(InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload,
                });
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                let accepted = ack
                    .return_codes
                    .iter()
                    .all(|code| matches!(code, SubscribeReasonCode::Success(_)));
                shared.subscribe_acked(ack.pkid, accepted);
            }
            Ok(Event::Outgoing(Outgoing::Subscribe(pkid))) => shared.subscribe_sent(pkid),
            Ok(Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect)) => {
                shared.emit(TransportEvent::Disconnected);
                break;
            }
            Ok(other) => trace!(?other, "mqtt event"),
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, "mqtt connection error");
                shared.emit(TransportEvent::Error(reason.clone()));
                match ready.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(reason));
                    }
                    None => shared.emit(TransportEvent::Disconnected),
                }
                break;
            }
        }
    }

    shared.drop_subscribe_waiters();
    shared.routes.clear();
    debug!("mqtt event loop stopped");
}

#[async_trait::async_trait]
impl MessagingTransport for MqttTransport {
    async fn connect(&self, config: &ConnectionConfig) -> Result<(), TransportError> {
        info!(
            endpoint = %config.endpoint,
            port = config.port,
            client_id = %config.client_id,
            "connecting to broker"
        );

        let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CHANNEL_SIZE);
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);

        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(run_event_loop(
            eventloop,
            Arc::clone(&self.shared),
            self.cancel.child_token(),
            ready_tx,
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        match tokio::time::timeout(BROKER_ACK_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(TransportError::Connect { reason }),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.cancel.cancel();
                Err(TransportError::Timeout)
            }
        }
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<Subscription, TransportError> {
        let client = self.client()?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.routes.entry(topic.to_owned()).or_default().push(tx);

        let (ack_tx, ack_rx) = oneshot::channel();
        let waiter = self.shared.register_subscribe(ack_tx);

        if let Err(e) = client.subscribe(topic, to_mqtt_qos(qos)).await {
            self.shared.withdraw_subscribe(waiter);
            self.shared.routes.remove(topic);
            return Err(client_error(&e));
        }

        let accepted = match tokio::time::timeout(BROKER_ACK_TIMEOUT, ack_rx).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(_)) => {
                self.shared.routes.remove(topic);
                return Err(TransportError::Closed);
            }
            Err(_) => {
                self.shared.withdraw_subscribe(waiter);
                self.shared.routes.remove(topic);
                return Err(TransportError::Timeout);
            }
        };

        if !accepted {
            self.shared.routes.remove(topic);
            return Err(TransportError::SubscribeRejected {
                topic: topic.to_owned(),
            });
        }

        debug!(topic, "subscribed");
        Ok(Subscription::new(topic, rx))
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), TransportError> {
        let client = self.client()?;
        debug!(topic, bytes = payload.len(), "publishing");
        client
            .publish_bytes(topic, to_mqtt_qos(qos), false, payload)
            .await
            .map_err(|e| client_error(&e))
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.shared.routes.remove(topic);
        let client = self.client()?;
        debug!(topic, "unsubscribing");
        client.unsubscribe(topic).await.map_err(|e| client_error(&e))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let client = self.client.lock().unwrap_or_else(PoisonError::into_inner).take();
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();

        let result = match client {
            Some(client) => client.disconnect().await.map_err(|e| client_error(&e)),
            None => Ok(()),
        };

        if let Some(mut task) = task {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
                self.cancel.cancel();
                let _ = task.await;
            }
        }
        result
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.shared.events.subscribe()
    }
}
