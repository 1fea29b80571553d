use secrecy::{ExposeSecret, SecretString};

/// Account credentials for the password grant.
///
/// Supplied once when a client is built and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account e-mail, sent as the OAuth `username`.
    pub email: String,
    pub password: SecretString,
    /// OAuth client identifier issued to the integration.
    pub client_id: String,
}

impl Credentials {
    pub fn new(
        email: impl Into<String>,
        password: SecretString,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password,
            client_id: client_id.into(),
        }
    }
}

/// Bearer token returned by the identity service.
///
/// Opaque to the REST layer. The MQTT authorizer interprets it as a
/// compact three-part `header.payload.signature` structure.
#[derive(Debug, Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw token string.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Value for the `Authorization` header.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}
