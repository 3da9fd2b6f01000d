//! Configuration types for the push client
//!
//! The endpoint is the backend's base URL; the per-session URL is derived from
//! it as `ws://host:port/ws/{user_id}?token={token}`.

use std::time::Duration;
use url::Url;

use crate::error::{Result, TransportError};
use crate::identity::SessionIdentity;

/// Base URL of the push endpoint, normalized to a `ws`/`wss` scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEndpoint {
    base: Url,
}

impl PushEndpoint {
    /// Parse a base URL. `http`/`https` are mapped to `ws`/`wss`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut base =
            Url::parse(raw).map_err(|e| TransportError::InvalidEndpoint(format!("{raw}: {e}")))?;

        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        };
        if base.host_str().is_none() {
            return Err(TransportError::InvalidEndpoint(format!("{raw}: missing host")));
        }
        base.set_scheme(scheme).map_err(|_| {
            TransportError::InvalidEndpoint(format!("{raw}: cannot switch scheme to {scheme}"))
        })?;
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self { base })
    }

    /// Whether the endpoint requires TLS
    pub fn is_secure(&self) -> bool {
        self.base.scheme() == "wss"
    }

    /// Build the session URL for an identity.
    pub fn session_url(&self, identity: &SessionIdentity) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .push("ws")
            .push(&identity.user_id().to_string());
        url.query_pairs_mut()
            .append_pair("token", identity.token().expose());
        Ok(url)
    }

    /// Base URL as a string (no credentials ever appear here)
    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }
}

impl Default for PushEndpoint {
    fn default() -> Self {
        Self {
            base: Url::parse("ws://localhost:8000/").expect("static endpoint is valid"),
        }
    }
}

/// Configuration for the WebSocket push client
#[derive(Debug, Clone)]
pub struct PushClientConfig {
    /// Base endpoint of the backend
    /// Default: ws://localhost:8000
    pub endpoint: PushEndpoint,

    /// Timeout for the TCP + WebSocket upgrade
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Largest inbound text frame accepted
    /// Default: 1 MiB
    pub max_frame_bytes: usize,

    /// How long `connect` waits after the upgrade for the server to refuse
    /// the token. Zero hands the channel out immediately.
    /// Default: 250 milliseconds
    pub auth_window: Duration,
}

impl Default for PushClientConfig {
    fn default() -> Self {
        Self {
            endpoint: PushEndpoint::default(),
            connect_timeout: Duration::from_secs(10),
            max_frame_bytes: 1024 * 1024,
            auth_window: Duration::from_millis(250),
        }
    }
}

impl PushClientConfig {
    /// Create a new PushClientConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout == Duration::ZERO {
            return Err(TransportError::InvalidEndpoint(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_frame_bytes == 0 {
            return Err(TransportError::InvalidEndpoint(
                "Max frame size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_endpoint(mut self, endpoint: PushEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    pub fn with_auth_window(mut self, window: Duration) -> Self {
        self.auth_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_maps_to_ws() {
        let endpoint = PushEndpoint::parse("http://localhost:8000").unwrap();
        assert_eq!(endpoint.as_str(), "ws://localhost:8000/");
        assert!(!endpoint.is_secure());

        let endpoint = PushEndpoint::parse("https://api.example.com").unwrap();
        assert!(endpoint.is_secure());
    }

    #[test]
    fn test_session_url() {
        let endpoint = PushEndpoint::parse("http://localhost:8000").unwrap();
        let identity = SessionIdentity::new(42, "abc.def").unwrap();
        let url = endpoint.session_url(&identity).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/42?token=abc.def");
    }

    #[test]
    fn test_session_url_keeps_base_path_and_encodes_token() {
        let endpoint = PushEndpoint::parse("https://example.com/api/").unwrap();
        let identity = SessionIdentity::new(7, "a+b/c=").unwrap();
        let url = endpoint.session_url(&identity).unwrap();
        assert_eq!(url.path(), "/api/ws/7");
        assert_eq!(url.query(), Some("token=a%2Bb%2Fc%3D"));
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        assert!(matches!(
            PushEndpoint::parse("ftp://example.com"),
            Err(TransportError::InvalidEndpoint(_))
        ));
        assert!(PushEndpoint::parse("not a url").is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(PushClientConfig::default().validate().is_ok());

        let config = PushClientConfig::new().with_connect_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = PushClientConfig::new().with_max_frame_bytes(0);
        assert!(config.validate().is_err());
    }

    proptest::proptest! {
        #[test]
        fn test_token_survives_query_encoding(
            user_id in 1u64..,
            token in "[!-~]{1,64}",
        ) {
            let endpoint = PushEndpoint::default();
            let identity = SessionIdentity::new(user_id, token.clone()).unwrap();
            let url = endpoint.session_url(&identity).unwrap();

            let expected_path = format!("/ws/{}", user_id);
            proptest::prop_assert_eq!(url.path(), expected_path.as_str());
            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            proptest::prop_assert_eq!(pairs, vec![("token".to_string(), token)]);
        }
    }
}
