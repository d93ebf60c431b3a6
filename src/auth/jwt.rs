//! JWT-backed identity lookup
//!
//! Tokens are issued elsewhere; the hub only verifies them. The subject is the
//! user id and the optional `role` claim selects the role group.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ConnectCredentials, IdentityLookup};
use crate::error::{HubError, HubResult};
use crate::types::Identity;

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// User role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, role: Option<String>, ttl_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.into(),
            role,
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() > self.exp
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: Some(self.sub.clone()).filter(|s| !s.is_empty()),
            role: self.role.clone().filter(|r| !r.is_empty()),
        }
    }
}

/// Verifies HS256 tokens with a shared secret
pub struct JwtIdentityLookup {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityLookup {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Validate a token and return claims
    pub fn validate_token(&self, token: &str) -> HubResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| HubError::Unauthorized)?;

        if data.claims.is_expired() {
            return Err(HubError::Unauthorized);
        }
        Ok(data.claims)
    }

    /// Sign claims with the same secret (used by tests and local tooling)
    pub fn sign(&self, claims: &Claims) -> HubResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| HubError::config(format!("cannot sign token: {}", e)))
    }
}

impl IdentityLookup for JwtIdentityLookup {
    fn lookup(&self, credentials: &ConnectCredentials) -> Option<Identity> {
        let token = credentials.token.as_deref()?;
        match self.validate_token(token) {
            Ok(claims) => Some(claims.identity()),
            Err(e) => {
                debug!(error = %e, "token rejected, connecting anonymously");
                None
            }
        }
    }
}
