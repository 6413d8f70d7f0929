//! Bearer credential attachment for outgoing API calls.
//!
//! The interceptor keeps a small mirror of the last token it handed out so a
//! burst of outbound calls does not re-materialize the session each time. The
//! mirror belongs to the interceptor instance, which is built per request
//! context; it is never shared between identities and never needed for
//! correctness.

use std::future::Future;

use axum::http::HeaderMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::jwt::{self, TokenError};
use crate::session::{Session, SessionMaterializer, current_service_token, refresh_session_token};
use crate::token_cache::CachedToken;

/// Last token handed out, with the session's recorded expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMirror {
    pub token: String,
    pub expires_at: u64,
}

impl TokenMirror {
    pub fn is_fresh_at(&self, now: u64) -> bool {
        self.expires_at > now
    }
}

impl From<CachedToken> for TokenMirror {
    fn from(cached: CachedToken) -> Self {
        Self {
            token: cached.token,
            expires_at: cached.expires_at,
        }
    }
}

/// Anything that can produce the current service token.
pub trait TokenSource: Send + Sync {
    fn current_token(&self) -> impl Future<Output = Result<Option<CachedToken>, TokenError>> + Send;
}

/// Token source backed by the session of one inbound request.
///
/// When seeded with an already materialized session the source refreshes
/// that session's token directly; otherwise each call looks the session up
/// from the request headers.
pub struct SessionTokenSource<'a, M> {
    materializer: &'a M,
    headers: &'a HeaderMap,
    config: &'a BridgeConfig,
    session: Mutex<Option<Session>>,
}

impl<'a, M: SessionMaterializer> SessionTokenSource<'a, M> {
    pub fn new(materializer: &'a M, headers: &'a HeaderMap, config: &'a BridgeConfig) -> Self {
        Self {
            materializer,
            headers,
            config,
            session: Mutex::new(None),
        }
    }

    /// Use a session the request already resolved instead of looking it up again.
    pub fn with_session(self, session: Session) -> Self {
        *self.session.lock() = Some(session);
        self
    }
}

impl<M: SessionMaterializer> TokenSource for SessionTokenSource<'_, M> {
    async fn current_token(&self) -> Result<Option<CachedToken>, TokenError> {
        let seeded = self.session.lock().clone();
        let Some(mut session) = seeded else {
            return current_service_token(self.materializer, self.headers, self.config).await;
        };

        let token = refresh_session_token(self.materializer, &mut session, self.config).await?;
        *self.session.lock() = Some(session);
        Ok(Some(token))
    }
}

pub struct RequestInterceptor<S> {
    source: S,
    mirror: Mutex<Option<TokenMirror>>,
}

impl<S: TokenSource> RequestInterceptor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            mirror: Mutex::new(None),
        }
    }

    /// Snapshot of the current mirror.
    pub fn mirror(&self) -> Option<TokenMirror> {
        self.mirror.lock().clone()
    }

    /// Bearer token for an outgoing call, or `None` to call unauthenticated.
    pub async fn bearer(&self) -> Option<String> {
        match jwt::unix_now() {
            Ok(now) => self.bearer_at(now).await,
            Err(e) => {
                warn!(error = %e, "Clock unavailable, sending request without credentials");
                None
            }
        }
    }

    /// Same as [`bearer`](Self::bearer) with an explicit current time.
    pub async fn bearer_at(&self, now: u64) -> Option<String> {
        if let Some(mirror) = self.mirror.lock().as_ref() {
            if mirror.is_fresh_at(now) {
                return Some(mirror.token.clone());
            }
        }

        match self.source.current_token().await {
            Ok(Some(cached)) => {
                let token = cached.token.clone();
                *self.mirror.lock() = Some(cached.into());
                Some(token)
            }
            Ok(None) => {
                debug!("No session, sending request without credentials");
                self.mirror.lock().take();
                None
            }
            Err(e) => {
                warn!(error = %e, "Service token unavailable, sending request without credentials");
                self.mirror.lock().take();
                None
            }
        }
    }

    /// Attach `Authorization: Bearer <token>` when a token is available.
    pub async fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
