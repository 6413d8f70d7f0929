//! Session materialization contract.
//!
//! The identity provider is an external collaborator. This module only
//! specifies what the bridge consumes from it: the live claims for a request
//! and a slot on the session for one cached service token.

use std::future::Future;
use std::time::Duration;

use axum::http::HeaderMap;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::jwt::{self, Claims, TokenError};
use crate::token_cache::{self, CachedToken};

/// A materialized session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque session identifier issued by the identity provider
    pub id: String,
    pub claims: Claims,
    /// Session expiry (Unix seconds)
    pub expires_at: u64,
    /// Service token cached for this session's lifetime
    pub service_token: Option<CachedToken>,
}

/// Errors from the session provider.
#[derive(Debug)]
pub enum SessionError {
    /// The backing store failed
    Store(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Store(e) => write!(f, "Session store error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

/// Resolves a request to its current identity.
pub trait SessionMaterializer: Send + Sync {
    /// Return the live session for the request, or `None` when signed out.
    fn materialize(
        &self,
        headers: &HeaderMap,
    ) -> impl Future<Output = Result<Option<Session>, SessionError>> + Send;

    /// Replace the cached service token attached to a session.
    fn attach_token(
        &self,
        session_id: &str,
        token: &CachedToken,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Terminate a session entirely.
    fn end_session(&self, session_id: &str)
    -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Look up the session, collapsing failures and timeouts to `None`.
pub async fn lookup_session<M>(
    materializer: &M,
    headers: &HeaderMap,
    timeout: Duration,
) -> Option<Session>
where
    M: SessionMaterializer,
{
    match tokio::time::timeout(timeout, materializer.materialize(headers)).await {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => {
            warn!(error = %e, "Session lookup failed, treating request as signed out");
            None
        }
        Err(_) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Session lookup timed out, treating request as signed out"
            );
            None
        }
    }
}

/// Ensure the session carries a fresh service token, minting if stale.
///
/// Returns the token to use and persists a newly minted one on the session.
/// Persisting is best-effort: the minted token is valid either way.
pub async fn refresh_session_token<M>(
    materializer: &M,
    session: &mut Session,
    config: &BridgeConfig,
) -> Result<CachedToken, TokenError>
where
    M: SessionMaterializer,
{
    let now = jwt::unix_now()?;
    let acquired = token_cache::acquire(
        session.service_token.as_ref(),
        &session.claims,
        &config.secret,
        config.token_ttl,
        now,
    )?;

    if acquired.was_minted() {
        debug!(
            subject = %session.claims.subject,
            expires_at = acquired.token().expires_at,
            "Minted service token"
        );
        if let Err(e) = materializer
            .attach_token(&session.id, acquired.token())
            .await
        {
            warn!(error = %e, "Failed to cache service token on session");
        }
    }

    let token = acquired.into_token();
    session.service_token = Some(token.clone());
    Ok(token)
}

/// Current service token for the request's session, if any.
pub async fn current_service_token<M>(
    materializer: &M,
    headers: &HeaderMap,
    config: &BridgeConfig,
) -> Result<Option<CachedToken>, TokenError>
where
    M: SessionMaterializer,
{
    let Some(mut session) =
        lookup_session(materializer, headers, config.session_lookup_timeout).await
    else {
        return Ok(None);
    };

    refresh_session_token(materializer, &mut session, config)
        .await
        .map(Some)
}
