// Identity and product API HTTP client
//
// Wraps `reqwest::Client` with endpoint construction and status mapping.
// Every call is a single round trip; caching lives one layer up.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::auth::{AccessToken, Credentials};
use crate::error::Error;
use crate::models::{DeviceRecord, TokenResponse, UserProfile};
use crate::transport::TransportConfig;

const DEFAULT_AUTH_URL: &str = "https://id.worx.com/oauth/token";
const DEFAULT_API_BASE: &str = "https://api.worxlandroid.com/api/v2/";

/// Where the identity and product services live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Full URL of the OAuth token endpoint.
    pub auth_url: Url,
    /// Product API base; always ends with `/`.
    pub api_base: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: Url::parse(DEFAULT_AUTH_URL).expect("valid default auth URL"),
            api_base: Url::parse(DEFAULT_API_BASE).expect("valid default API URL"),
        }
    }
}

impl Endpoints {
    /// Build endpoints from explicit URLs.
    ///
    /// A missing trailing slash on `api_base` is added so that relative
    /// joins keep the last path segment.
    pub fn new(auth_url: Url, mut api_base: Url) -> Self {
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }
        Self { auth_url, api_base }
    }

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.api_base.join(path)?)
    }
}

/// HTTP client for the Worx identity and product services.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl CloudClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(endpoints: Endpoints, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, endpoints })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Exchange account credentials for an access token (password grant).
    pub async fn exchange_token(&self, credentials: &Credentials) -> Result<AccessToken, Error> {
        use secrecy::ExposeSecret;

        let url = self.endpoints.auth_url.clone();
        debug!(%url, email = %credentials.email, "requesting access token");

        let body = json!({
            "client_id": credentials.client_id,
            "username": credentials.email,
            "password": credentials.password.expose_secret(),
            "scope": "*",
            "grant_type": "password",
        });

        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Authentication {
                status: status.as_u16(),
                message: text,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.clone(),
            })?;

        debug!(expires_in = ?token.expires_in, "access token issued");
        Ok(AccessToken::new(token.access_token))
    }

    // ── Product API ──────────────────────────────────────────────────

    /// Profile of the authenticated account.
    pub async fn user_profile(&self, token: &AccessToken) -> Result<UserProfile, Error> {
        let url = self.endpoints.api_url("users/me")?;
        self.get_json(url, token).await
    }

    /// Devices registered to the authenticated account, in service order.
    pub async fn product_items(&self, token: &AccessToken) -> Result<Vec<DeviceRecord>, Error> {
        let url = self.endpoints.api_url("product-items")?;
        let devices: Vec<DeviceRecord> = self.get_json(url, token).await?;
        debug!(count = devices.len(), "product items listed");
        Ok(devices)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &AccessToken,
    ) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Authentication {
                    status: status.as_u16(),
                    message: body,
                });
            }
            s if !s.is_success() => {
                return Err(Error::Api {
                    status: s.as_u16(),
                    message: body,
                });
            }
            _ => {}
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn default_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.auth_url.as_str(), DEFAULT_AUTH_URL);
        assert_eq!(
            endpoints.api_url("users/me").unwrap().as_str(),
            "https://api.worxlandroid.com/api/v2/users/me"
        );
    }

    #[test]
    fn api_base_without_trailing_slash_keeps_last_segment() {
        let endpoints = Endpoints::new(
            Url::parse("http://127.0.0.1:9000/oauth/token").unwrap(),
            Url::parse("http://127.0.0.1:9000/api/v2").unwrap(),
        );
        assert_eq!(
            endpoints.api_url("product-items").unwrap().as_str(),
            "http://127.0.0.1:9000/api/v2/product-items"
        );
    }
}
