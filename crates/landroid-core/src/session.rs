// ── Broker session ──
//
// Owns the single transport connection. Opening it is attempted once; a
// failed connect is logged and recorded as `SessionState::Unavailable`
// instead of being returned. Lifecycle events are observed by a background
// task that logs them and marks a live session as disconnected. There is
// no reconnect.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::connection::ConnectionConfig;
use crate::error::CoreError;
use crate::transport::{MessagingTransport, TransportEvent};

/// Observable state of the broker session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotEstablished,
    Connecting,
    Connected,
    /// Was connected, then lost the connection.
    Disconnected,
    /// The connect attempt failed.
    Unavailable { reason: String },
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEstablished => f.write_str("not established"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Unavailable { reason } => write!(f, "unavailable ({reason})"),
        }
    }
}

pub(crate) struct Session {
    transport: Arc<dyn MessagingTransport>,
    state: watch::Sender<SessionState>,
    observer: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Session {
    pub(crate) fn new(transport: Arc<dyn MessagingTransport>) -> Self {
        let (state, _) = watch::channel(SessionState::NotEstablished);
        Self {
            transport,
            state,
            observer: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn MessagingTransport> {
        &self.transport
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Start the lifecycle observer and open the connection.
    ///
    /// Never fails: a connect error ends up in the session state.
    pub(crate) async fn open(&self, config: &ConnectionConfig) {
        let events = self.transport.events();
        let handle = tokio::spawn(observe(
            events,
            self.state.clone(),
            self.cancel.child_token(),
        ));
        if let Some(previous) = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }

        self.state.send_replace(SessionState::Connecting);

        match self.transport.connect(config).await {
            // A drop seen by the observer during the handshake wins.
            Ok(()) => {
                self.state.send_if_modified(|current| {
                    if *current == SessionState::Connecting {
                        *current = SessionState::Connected;
                        true
                    } else {
                        false
                    }
                });
            }
            Err(e) => {
                let err = CoreError::Connection {
                    endpoint: format!("{}:{}", config.endpoint, config.port),
                    reason: e.to_string(),
                };
                warn!(error = %err, "broker session unavailable");
                self.state.send_replace(SessionState::Unavailable {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Fail fast unless the session is connected.
    pub(crate) fn ensure_ready(&self) -> Result<(), CoreError> {
        let reason = match &*self.state.borrow() {
            SessionState::Connected => return Ok(()),
            SessionState::Unavailable { reason } => reason.clone(),
            other => other.to_string(),
        };
        Err(CoreError::SessionUnavailable { reason })
    }

    pub(crate) async fn close(&self) -> Result<(), CoreError> {
        let result = self.transport.disconnect().await;
        self.cancel.cancel();
        let handle = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        mark_disconnected(&self.state);
        result.map_err(CoreError::from)
    }
}

fn mark_disconnected(state: &watch::Sender<SessionState>) {
    state.send_if_modified(|current| {
        if matches!(current, SessionState::Connected | SessionState::Connecting) {
            *current = SessionState::Disconnected;
            true
        } else {
            false
        }
    });
}

async fn observe(
    mut events: broadcast::Receiver<TransportEvent>,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(TransportEvent::Connected) => info!("broker session connected"),
            Ok(TransportEvent::Error(reason)) => {
                error!(%reason, "broker session error");
                mark_disconnected(&state);
            }
            Ok(TransportEvent::Disconnected) => {
                info!("broker session disconnected");
                mark_disconnected(&state);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session observer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
