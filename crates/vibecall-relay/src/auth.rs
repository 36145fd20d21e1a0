//! Session-token validation for the authenticated credential route.
//!
//! The relay never mints session tokens; it only validates tokens issued
//! by the application's auth service against a shared secret.

use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an application session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Authenticated user id.
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Validates application session tokens.
pub struct SessionValidator {
    decoding_key: DecodingKey,
}

impl SessionValidator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Validate a token and return its claims.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let data = jsonwebtoken::decode::<SessionClaims>(
            token,
            &self.decoding_key,
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}
