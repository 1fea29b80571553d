// ── Credential and directory caches ──
//
// Token, user profile, and first device are each fetched at most once per
// client. Concurrent first callers share one fetch. A failed fetch leaves
// the cell empty, so the next call tries again.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use landroid_api::{AccessToken, CloudClient, Credentials, DeviceRecord, UserProfile};

use crate::error::CoreError;

pub(crate) struct DirectoryCache {
    api: CloudClient,
    credentials: Credentials,
    token: OnceCell<AccessToken>,
    user: OnceCell<Arc<UserProfile>>,
    device: OnceCell<Arc<DeviceRecord>>,
}

impl DirectoryCache {
    pub(crate) fn new(api: CloudClient, credentials: Credentials) -> Self {
        Self {
            api,
            credentials,
            token: OnceCell::new(),
            user: OnceCell::new(),
            device: OnceCell::new(),
        }
    }

    pub(crate) async fn access_token(&self) -> Result<&AccessToken, CoreError> {
        self.token
            .get_or_try_init(|| async {
                let token = self.api.exchange_token(&self.credentials).await?;
                info!(email = %self.credentials.email, "access token acquired");
                Ok::<_, CoreError>(token)
            })
            .await
    }

    pub(crate) async fn user_profile(&self) -> Result<Arc<UserProfile>, CoreError> {
        self.user
            .get_or_try_init(|| async { self.fetch_user_profile().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub(crate) async fn device(&self) -> Result<Arc<DeviceRecord>, CoreError> {
        self.device
            .get_or_try_init(|| async {
                let device = self
                    .fetch_devices()
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(CoreError::EmptyDeviceList)?;
                debug!(
                    device_id = device.id,
                    endpoint = %device.mqtt_endpoint,
                    "device selected"
                );
                Ok::<_, CoreError>(Arc::new(device))
            })
            .await
            .cloned()
    }

    /// Uncached profile read; still uses the cached token.
    pub(crate) async fn fetch_user_profile(&self) -> Result<UserProfile, CoreError> {
        let token = self.access_token().await?;
        self.api
            .user_profile(token)
            .await
            .map_err(|e| CoreError::directory("user profile", &e))
    }

    /// Uncached device list read; still uses the cached token.
    pub(crate) async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>, CoreError> {
        let token = self.access_token().await?;
        self.api
            .product_items(token)
            .await
            .map_err(|e| CoreError::directory("device list", &e))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use landroid_api::Endpoints;
    use landroid_api::transport::TransportConfig;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, DirectoryCache) {
        let server = MockServer::start().await;
        let endpoints = Endpoints::new(
            Url::parse(&format!("{}/oauth/token", server.uri())).unwrap(),
            Url::parse(&format!("{}/api/v2/", server.uri())).unwrap(),
        );
        let api = CloudClient::new(endpoints, &TransportConfig::default()).unwrap();
        let credentials = Credentials::new("u@x.com", "p".to_string().into(), "c");
        (server, DirectoryCache::new(api, credentials))
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": "h.p.s" })),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn token_is_exchanged_once() {
        let (server, cache) = setup().await;
        mount_token(&server, 1).await;

        let first = cache.access_token().await.unwrap().expose().to_owned();
        let second = cache.access_token().await.unwrap().expose().to_owned();
        assert_eq!(first, "h.p.s");
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_share_one_exchange() {
        let (server, cache) = setup().await;
        mount_token(&server, 1).await;
        let cache = Arc::new(cache);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache.access_token().await.map(|t| t.expose().to_owned())
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "h.p.s");
        }
    }

    #[tokio::test]
    async fn failed_exchange_is_retried() {
        let (server, cache) = setup().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_token(&server, 1).await;

        let err = cache.access_token().await.unwrap_err();
        assert!(matches!(err, CoreError::Authentication { .. }), "got: {err:?}");
        assert_eq!(cache.access_token().await.unwrap().expose(), "h.p.s");
    }

    #[tokio::test]
    async fn empty_device_list_is_not_cached() {
        let (server, cache) = setup().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/product-items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;

        assert!(matches!(cache.device().await, Err(CoreError::EmptyDeviceList)));
        assert!(matches!(cache.device().await, Err(CoreError::EmptyDeviceList)));
    }

    #[tokio::test]
    async fn directory_failure_names_resource() {
        let (server, cache) = setup().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/users/me"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = cache.user_profile().await.unwrap_err();
        assert!(
            matches!(err, CoreError::DirectoryFetch { resource: "user profile", .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn rejected_profile_read_is_a_directory_failure() {
        let (server, cache) = setup().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/users/me"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let err = cache.user_profile().await.unwrap_err();
        assert!(
            matches!(err, CoreError::DirectoryFetch { resource: "user profile", .. }),
            "got: {err:?}"
        );
        // The failure is not cached; the token is.
        assert!(cache.user_profile().await.is_err());
    }
}
