//! Bridge configuration resolved once at startup.
//!
//! Every environment-dependent choice (secure flag, cookie name, lifetimes)
//! lives here and is passed explicitly to the gatekeeper and minter.

use std::time::Duration;

use crate::jwt::{DEFAULT_TOKEN_TTL, SigningSecret, TokenError};

/// Service cookie name outside production.
pub const SERVICE_COOKIE_NAME: &str = "service_token";

/// Service cookie name in production. The `__Secure-` prefix makes browsers
/// refuse the cookie unless it was set over HTTPS with the Secure flag.
pub const SECURE_SERVICE_COOKIE_NAME: &str = "__Secure-service_token";

/// Default service cookie lifetime: 7 days
pub const DEFAULT_COOKIE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default upper bound on a session lookup.
pub const DEFAULT_SESSION_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Deployment environment.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub is_production: bool,
    /// Name of the externally readable service-token cookie
    pub cookie_name: &'static str,
    /// Lifetime of minted service tokens
    pub token_ttl: Duration,
    /// Max-Age of the service cookie
    pub cookie_ttl: Duration,
    /// Upper bound on a single session lookup before failing closed
    pub session_lookup_timeout: Duration,
    pub secret: SigningSecret,
}

impl BridgeConfig {
    /// Build a configuration with default lifetimes.
    /// Fails when the secret is empty.
    pub fn new(environment: Environment, secret: &[u8]) -> Result<Self, TokenError> {
        let is_production = environment == Environment::Production;
        Ok(Self {
            is_production,
            cookie_name: if is_production {
                SECURE_SERVICE_COOKIE_NAME
            } else {
                SERVICE_COOKIE_NAME
            },
            token_ttl: DEFAULT_TOKEN_TTL,
            cookie_ttl: DEFAULT_COOKIE_TTL,
            session_lookup_timeout: DEFAULT_SESSION_LOOKUP_TIMEOUT,
            secret: SigningSecret::new(secret)?,
        })
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_cookie_ttl(mut self, ttl: Duration) -> Self {
        self.cookie_ttl = ttl;
        self
    }

    pub fn with_session_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.session_lookup_timeout = timeout;
        self
    }

    /// Whether cookies must carry the Secure flag.
    pub fn secure_cookies(&self) -> bool {
        self.is_production
    }
}
