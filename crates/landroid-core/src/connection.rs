// ── Broker connection parameters ──
//
// Derives the MQTT client identity and the custom-authorizer credential
// from the access token, the user id, and the device's broker endpoint.

use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;

use landroid_api::AccessToken;

use crate::error::CoreError;

pub const BROKER_PORT: u16 = 443;
pub const ALPN_PROTOCOL: &[u8] = b"mqtt";

const AUTHORIZER_NAME: &str = "iobroker";
const SIGNATURE_PARAM: &str = "x-amz-customauthorizer-signature";

/// Credential presented to the broker's custom authorizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAuthorizer {
    /// `{name}?jwt={header}.{payload}`
    pub path: String,
    pub signature: String,
    pub token_key_name: String,
    pub token_value: String,
}

impl CustomAuthorizer {
    /// Split and encode an access token into authorizer parts.
    ///
    /// The token is re-mapped from URL-safe base64 (`_`, `-`) to the
    /// standard alphabet (`/`, `+`) first, then each of its three
    /// dot-separated segments is percent-encoded on its own.
    pub fn from_token(token: &str) -> Result<Self, CoreError> {
        let mapped = token.replace('_', "/").replace('-', "+");
        let segments: Vec<&str> = mapped.split('.').collect();

        let [header, payload, signature] = segments.as_slice() else {
            return Err(CoreError::InvalidToken {
                segments: segments.len(),
            });
        };

        Ok(Self {
            path: format!(
                "{AUTHORIZER_NAME}?jwt={}.{}",
                urlencoding::encode(header),
                urlencoding::encode(payload)
            ),
            signature: urlencoding::encode(signature).into_owned(),
            token_key_name: AUTHORIZER_NAME.into(),
            token_value: AUTHORIZER_NAME.into(),
        })
    }

    /// MQTT username carrying the authorizer parameters.
    pub fn username(&self) -> String {
        let mut username = self.path.clone();
        add_query_parameter(&mut username, SIGNATURE_PARAM, &self.signature);
        add_query_parameter(&mut username, &self.token_key_name, &self.token_value);
        username
    }
}

fn add_query_parameter(target: &mut String, key: &str, value: &str) {
    target.push(if target.contains('?') { '&' } else { '?' });
    target.push_str(key);
    target.push('=');
    target.push_str(value);
}

/// Everything needed to open the broker session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub client_id: String,
    pub endpoint: String,
    pub port: u16,
    pub clean_session: bool,
    pub keep_alive: Duration,
    pub authorizer: CustomAuthorizer,
}

impl ConnectionConfig {
    pub fn build(
        token: &AccessToken,
        user_id: u64,
        endpoint: &str,
        keep_alive: Duration,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            client_id: client_identity(user_id),
            endpoint: endpoint.to_owned(),
            port: BROKER_PORT,
            clean_session: false,
            keep_alive,
            authorizer: CustomAuthorizer::from_token(token.expose())?,
        })
    }

    pub fn username(&self) -> String {
        self.authorizer.username()
    }
}

/// `WX/USER/{user_id}/iobroker/{random}` with 8 to 64 alphanumerics.
pub fn client_identity(user_id: u64) -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(8..=64);
    let suffix: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();
    format!("WX/USER/{user_id}/{AUTHORIZER_NAME}/{suffix}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn client_identity_shape() {
        for _ in 0..200 {
            let id = client_identity(42);
            let suffix = id.strip_prefix("WX/USER/42/iobroker/").unwrap();
            assert!((8..=64).contains(&suffix.len()), "bad length: {id}");
            assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()), "bad chars: {id}");
        }
    }

    #[test]
    fn authorizer_maps_and_encodes_segments() {
        let auth = CustomAuthorizer::from_token("a_b.c-d.e_f").unwrap();
        assert_eq!(auth.path, "iobroker?jwt=a%2Fb.c%2Bd");
        assert_eq!(auth.signature, "e%2Ff");
        assert_eq!(auth.token_key_name, "iobroker");
        assert_eq!(auth.token_value, "iobroker");
    }

    #[test]
    fn authorizer_rejects_wrong_segment_count() {
        let err = CustomAuthorizer::from_token("only.two").unwrap_err();
        assert!(matches!(err, CoreError::InvalidToken { segments: 2 }));

        let err = CustomAuthorizer::from_token("a.b.c.d").unwrap_err();
        assert!(matches!(err, CoreError::InvalidToken { segments: 4 }));
    }

    #[test]
    fn username_appends_signature_and_token_key() {
        let auth = CustomAuthorizer::from_token("h.p.s").unwrap();
        assert_eq!(
            auth.username(),
            "iobroker?jwt=h.p&x-amz-customauthorizer-signature=s&iobroker=iobroker"
        );
    }

    #[test]
    fn build_uses_fixed_session_settings() {
        let config = ConnectionConfig::build(
            &AccessToken::new("h.p.s"),
            7,
            "broker.example.com",
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(config.endpoint, "broker.example.com");
        assert_eq!(config.port, 443);
        assert!(!config.clean_session);
        assert!(config.client_id.starts_with("WX/USER/7/iobroker/"));
        assert_eq!(config.authorizer.signature, "s");
    }
}
