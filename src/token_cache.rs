//! Per-session token cache and refresh policy.
//!
//! A session holds at most one cached service token. It is FRESH while
//! `expires_at > now` and STALE otherwise; a stale (or missing) entry is
//! replaced wholesale by a new mint.
//!
//! Staleness uses the expiry recorded at mint time rather than re-reading the
//! token's own `exp`. Both are derived from the same clock reading, so they
//! only diverge if the stored value is tampered with.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::jwt::{self, Claims, SigningSecret, TokenError};

/// Cached service token attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub token: String,
    /// Mint time plus TTL (Unix seconds), recorded once at mint time
    pub expires_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Fresh,
    Stale,
}

impl CachedToken {
    /// A token exactly at its expiry boundary is stale.
    pub fn state_at(&self, now: u64) -> TokenState {
        if self.expires_at <= now {
            TokenState::Stale
        } else {
            TokenState::Fresh
        }
    }

    pub fn is_fresh_at(&self, now: u64) -> bool {
        self.state_at(now) == TokenState::Fresh
    }
}

impl From<jwt::MintedToken> for CachedToken {
    fn from(minted: jwt::MintedToken) -> Self {
        Self {
            token: minted.token,
            expires_at: minted.expires_at,
        }
    }
}

/// Outcome of asking the policy for the current token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// The cached token was still fresh and is returned unchanged
    Cached(CachedToken),
    /// A new token was minted and must replace the cached one
    Minted(CachedToken),
}

impl Acquired {
    pub fn token(&self) -> &CachedToken {
        match self {
            Acquired::Cached(t) | Acquired::Minted(t) => t,
        }
    }

    pub fn into_token(self) -> CachedToken {
        match self {
            Acquired::Cached(t) | Acquired::Minted(t) => t,
        }
    }

    pub fn was_minted(&self) -> bool {
        matches!(self, Acquired::Minted(_))
    }
}

/// Return the cached token if fresh, otherwise mint a replacement.
pub fn acquire(
    cached: Option<&CachedToken>,
    claims: &Claims,
    secret: &SigningSecret,
    ttl: Duration,
    now: u64,
) -> Result<Acquired, TokenError> {
    if let Some(cached) = cached {
        if cached.is_fresh_at(now) {
            return Ok(Acquired::Cached(cached.clone()));
        }
    }

    let minted = jwt::mint_at(claims, secret, ttl, now)?;
    Ok(Acquired::Minted(minted.into()))
}
