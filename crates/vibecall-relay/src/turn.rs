//! TURN credential issuance.
//!
//! Two modes, tried in order: ephemeral coturn REST-style credentials
//! (HMAC-SHA1 over `<expiry>:<user>` under a shared secret) when a secret
//! is configured, else a static username/password fallback. Neither
//! configured is a configuration error, as is a missing relay address.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use vibecall_core::time::unix_timestamp;

type HmacSha1 = Hmac<Sha1>;

/// Default lifetime of an ephemeral credential.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Issuer configuration, resolved from flags/environment at startup.
#[derive(Debug, Clone, Default)]
pub struct TurnConfig {
    /// Relay address without scheme, e.g. `turn.example.com:3478`.
    pub server_url: Option<String>,
    /// Enables ephemeral mode when set.
    pub shared_secret: Option<String>,
    pub static_username: Option<String>,
    pub static_password: Option<String>,
    pub ttl_secs: u64,
}

/// A credential response as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnCredentials {
    pub username: String,
    pub credential: String,
    /// `None` (serialized as `null`) for static credentials.
    pub ttl: Option<u64>,
    pub urls: Vec<String>,
}

/// An entry of the `/api/webrtc/config` ICE server list.
#[derive(Debug, Clone, Serialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("TURN server URL not configured")]
    ServerUrlMissing,

    #[error("No TURN credential configuration found")]
    NotConfigured,
}

/// Computes relay credentials on demand.
pub struct TurnIssuer {
    config: TurnConfig,
}

impl TurnIssuer {
    pub const fn new(config: TurnConfig) -> Self {
        Self { config }
    }

    /// Issue credentials against the current clock.
    pub fn issue(&self, user_hint: Option<&str>) -> Result<TurnCredentials, TurnError> {
        self.issue_at(user_hint, unix_timestamp())
    }

    /// Issue credentials against a caller-supplied clock. Deterministic:
    /// the same inputs always produce the same credential.
    pub fn issue_at(
        &self,
        user_hint: Option<&str>,
        now_secs: i64,
    ) -> Result<TurnCredentials, TurnError> {
        let Some(server_url) = self.config.server_url.as_deref() else {
            return Err(TurnError::ServerUrlMissing);
        };

        if let Some(secret) = self.config.shared_secret.as_deref() {
            let ttl = self.config.ttl_secs;
            #[allow(clippy::cast_possible_wrap)]
            let expiry = now_secs + ttl as i64;
            let username = format!("{expiry}:{}", user_hint.unwrap_or("anon"));
            let credential = sign(secret, &username);
            return Ok(TurnCredentials {
                username,
                credential,
                ttl: Some(ttl),
                urls: vec![
                    format!("turn:{server_url}?transport=udp"),
                    format!("turn:{server_url}?transport=tcp"),
                    format!("turns:{server_url}?transport=tcp"),
                ],
            });
        }

        if let (Some(username), Some(password)) = (
            self.config.static_username.as_deref(),
            self.config.static_password.as_deref(),
        ) {
            // Static fallback carries no TLS variant and no expiry.
            return Ok(TurnCredentials {
                username: username.to_string(),
                credential: password.to_string(),
                ttl: None,
                urls: vec![
                    format!("turn:{server_url}?transport=udp"),
                    format!("turn:{server_url}?transport=tcp"),
                ],
            });
        }

        Err(TurnError::NotConfigured)
    }

    /// Static ICE-server entry for the config endpoint, present only when
    /// the relay is statically configured. Ephemeral credentials are never
    /// exposed through the config route.
    pub fn static_ice_server(&self) -> Option<IceServer> {
        let server_url = self.config.server_url.as_deref()?;
        let username = self.config.static_username.as_deref()?;
        let password = self.config.static_password.as_deref()?;
        Some(IceServer {
            urls: format!("turn:{server_url}"),
            username: Some(username.to_string()),
            credential: Some(password.to_string()),
        })
    }
}

/// HMAC-SHA1 of the username under the shared secret, base64 encoded
/// (coturn REST credential style).
#[allow(clippy::expect_used)]
fn sign(secret: &str, username: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(username.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}
