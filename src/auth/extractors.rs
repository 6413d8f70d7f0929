//! Axum extractors for the current session.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthRedirect;
use super::state::HasBridgeBackend;
use crate::gatekeeper::GatedSession;
use crate::session::{Session, lookup_session};

/// Extractor for handlers that need the live session.
///
/// Uses the session the gatekeeper already materialized when present, so a
/// protected request looks the session up once. Falls back to a fresh
/// lookup for routes outside the gatekeeper's protected set.
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: HasBridgeBackend + Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(GatedSession(session)) = parts.extensions.get::<GatedSession>() {
            return Ok(CurrentSession(session.clone()));
        }

        lookup_session(
            state.sessions(),
            &parts.headers,
            state.config().session_lookup_timeout,
        )
        .await
        .map(CurrentSession)
        .ok_or_else(|| AuthRedirect {
            login_path: state.routes().login_path.clone(),
        })
    }
}
