//! Server configuration
//!
//! Environment:
//! - `HUB_BIND_ADDR`: listen address (optional, default `0.0.0.0:5000`)
//! - `HUB_JWT_SECRET`: token verification secret (required, min 32 chars)
//! - `HUB_ADMIN_ROLE`: role allowed to call admin endpoints (optional, default `admin`)
//! - `HUB_BAN_MESSAGE`: default `userbanned` payload (optional)
//! - `HUB_ACTIVATED_MESSAGE`: default `useractivated` payload (optional)
//! - `HUB_OUTBOX_CAPACITY`: events queued per connection before new ones are dropped (optional, default 256)

use std::net::SocketAddr;

use crate::error::{HubError, HubResult};
use crate::hub::DEFAULT_OUTBOX_CAPACITY;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_ADMIN_ROLE: &str = "admin";
pub const DEFAULT_BAN_MESSAGE: &str = "Your account has been locked by an administrator.";
pub const DEFAULT_ACTIVATED_MESSAGE: &str = "Your account has been reactivated.";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub admin_role: String,
    pub ban_message: String,
    pub activated_message: String,
    pub outbox_capacity: usize,
}

impl HubConfig {
    /// Build a config with defaults for everything but the secret
    pub fn new(jwt_secret: impl Into<String>) -> HubResult<Self> {
        let jwt_secret = jwt_secret.into();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(HubError::config(format!(
                "HUB_JWT_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            bind_addr: parse_addr(DEFAULT_BIND_ADDR)?,
            jwt_secret,
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
            ban_message: DEFAULT_BAN_MESSAGE.to_string(),
            activated_message: DEFAULT_ACTIVATED_MESSAGE.to_string(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        })
    }

    pub fn from_env() -> HubResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> HubResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("HUB_JWT_SECRET")
            .ok_or_else(|| HubError::config("HUB_JWT_SECRET is not set"))?;
        let mut config = Self::new(secret)?;

        if let Some(addr) = lookup("HUB_BIND_ADDR") {
            config.bind_addr = parse_addr(&addr)?;
        }
        if let Some(role) = lookup("HUB_ADMIN_ROLE").filter(|r| !r.is_empty()) {
            config.admin_role = role;
        }
        if let Some(message) = lookup("HUB_BAN_MESSAGE").filter(|m| !m.is_empty()) {
            config.ban_message = message;
        }
        if let Some(message) = lookup("HUB_ACTIVATED_MESSAGE").filter(|m| !m.is_empty()) {
            config.activated_message = message;
        }
        if let Some(raw) = lookup("HUB_OUTBOX_CAPACITY") {
            config.outbox_capacity = match raw.parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => {
                    return Err(HubError::config(format!(
                        "invalid HUB_OUTBOX_CAPACITY '{}': expected a positive integer",
                        raw
                    )))
                }
            };
        }

        Ok(config)
    }

    /// Case-insensitive check against the configured admin role
    pub fn is_admin_role(&self, role: &str) -> bool {
        role.eq_ignore_ascii_case(&self.admin_role)
    }
}

fn parse_addr(raw: &str) -> HubResult<SocketAddr> {
    raw.parse()
        .map_err(|e| HubError::config(format!("invalid HUB_BIND_ADDR '{}': {}", raw, e)))
}
