// ── Landroid client ──
//
// Entry point for consumers. Ties the caches, the connection builder, the
// broker session, and the request coordinator together. Cheaply cloneable;
// every clone shares the same caches and connection.

use std::sync::Arc;

use tokio::sync::{OnceCell, watch};
use tracing::{debug, info};

use landroid_api::transport::TransportConfig;
use landroid_api::{AccessToken, CloudClient, DeviceRecord, UserProfile};

use crate::cache::DirectoryCache;
use crate::config::ClientConfig;
use crate::connection::ConnectionConfig;
use crate::error::CoreError;
use crate::model::MowerStatus;
use crate::request::RequestCoordinator;
use crate::session::{Session, SessionState};
use crate::transport::{MessagingTransport, MqttTransport};

/// Cloud client for one account and its first registered mower.
#[derive(Clone)]
pub struct LandroidClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    directory: DirectoryCache,
    session: Session,
    established: OnceCell<()>,
    coordinator: RequestCoordinator,
}

impl LandroidClient {
    /// Build a client without touching the network.
    ///
    /// Call [`establish()`](Self::establish) before requesting status, or
    /// use [`connect()`](Self::connect) which does both.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn MessagingTransport>,
    ) -> Result<Self, CoreError> {
        let http = TransportConfig::default()
            .with_timeout(config.http_timeout)
            .build_client()?;
        let api = CloudClient::with_client(http, config.endpoints.clone());
        let coordinator = RequestCoordinator::new(
            config.request_timeout,
            config.language.clone(),
            config.reply_matching,
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                directory: DirectoryCache::new(api, config.credentials.clone()),
                session: Session::new(transport),
                established: OnceCell::new(),
                coordinator,
                config,
            }),
        })
    }

    /// Build a client and open its broker session.
    ///
    /// Token, profile, and device failures are returned. A failed broker
    /// connect is not: it shows up in [`session_state()`](Self::session_state)
    /// and makes every request fail with `SessionUnavailable`.
    pub async fn connect(
        config: ClientConfig,
        transport: Arc<dyn MessagingTransport>,
    ) -> Result<Self, CoreError> {
        let client = Self::new(config, transport)?;
        client.establish().await?;
        Ok(client)
    }

    /// [`connect()`](Self::connect) over the production MQTT transport.
    pub async fn connect_mqtt(config: ClientConfig) -> Result<Self, CoreError> {
        Self::connect(config, Arc::new(MqttTransport::new())).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Open the broker session. Runs once; later calls return immediately.
    pub async fn establish(&self) -> Result<(), CoreError> {
        self.inner
            .established
            .get_or_try_init(|| async {
                let connection = self.build_connection_config().await?;
                self.inner.session.open(&connection).await;
                info!(state = %self.inner.session.state(), "session established");
                Ok::<_, CoreError>(())
            })
            .await
            .map(|_| ())
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.session.state()
    }

    /// Watch session state changes.
    pub fn session_states(&self) -> watch::Receiver<SessionState> {
        self.inner.session.subscribe_state()
    }

    /// Disconnect from the broker.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        debug!("shutting down client");
        self.inner.session.close().await
    }

    // ── Cached directory data ────────────────────────────────────────

    /// Bearer token, exchanged on first use.
    pub async fn access_token(&self) -> Result<AccessToken, CoreError> {
        self.inner.directory.access_token().await.cloned()
    }

    /// Profile of the account, fetched on first use.
    pub async fn user_profile(&self) -> Result<Arc<UserProfile>, CoreError> {
        self.inner.directory.user_profile().await
    }

    /// First registered device, fetched on first use.
    pub async fn device(&self) -> Result<Arc<DeviceRecord>, CoreError> {
        self.inner.directory.device().await
    }

    /// Fresh profile read, bypassing the profile cache.
    pub async fn fetch_user_profile(&self) -> Result<UserProfile, CoreError> {
        self.inner.directory.fetch_user_profile().await
    }

    /// Fresh device list read, bypassing the device cache.
    pub async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>, CoreError> {
        self.inner.directory.fetch_devices().await
    }

    // ── Broker ───────────────────────────────────────────────────────

    /// Connection parameters for the first device's broker.
    pub async fn build_connection_config(&self) -> Result<ConnectionConfig, CoreError> {
        let token = self.inner.directory.access_token().await?;
        let user = self.inner.directory.user_profile().await?;
        let device = self.inner.directory.device().await?;

        ConnectionConfig::build(
            token,
            user.id,
            &device.mqtt_endpoint,
            self.inner.config.keep_alive,
        )
    }

    /// Ping the mower and return its status report.
    pub async fn mower_status(&self) -> Result<MowerStatus, CoreError> {
        self.inner.session.ensure_ready()?;
        let device = self.device().await?;
        self.inner
            .coordinator
            .request_status(
                self.inner.session.transport().as_ref(),
                &device.mqtt_topics,
            )
            .await
    }
}
