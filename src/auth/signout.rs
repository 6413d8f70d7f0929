//! Sign-out responses.

use axum::response::{IntoResponse, Redirect, Response};
use tracing::{info, warn};

use super::cookie::{SESSION_COOKIE_NAME, append_set_cookie, clear_cookie};
use super::state::HasBridgeBackend;
use crate::api_client::RemoteTokenCode;
use crate::session::{Session, SessionMaterializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user asked to sign out
    UserRequested,
    /// The downstream API rejected the service token
    RemoteInvalidToken(RemoteTokenCode),
}

impl SignOutReason {
    fn query(&self) -> Option<&'static str> {
        match self {
            SignOutReason::UserRequested => None,
            SignOutReason::RemoteInvalidToken(_) => Some("session_expired"),
        }
    }
}

/// End the session, clear both cookies and redirect to login.
pub async fn sign_out<S>(state: &S, session: &Session, reason: SignOutReason) -> Response
where
    S: HasBridgeBackend,
{
    if let Err(e) = state.sessions().end_session(&session.id).await {
        warn!(error = %e, "Failed to end session");
    }
    info!(subject = %session.claims.subject, reason = ?reason, "Signed out");

    let login_path = &state.routes().login_path;
    let target = match reason.query() {
        Some(reason) => format!("{}?reason={}", login_path, reason),
        None => login_path.clone(),
    };

    let secure = state.config().secure_cookies();
    let mut response = Redirect::to(&target).into_response();
    let headers = response.headers_mut();
    append_set_cookie(headers, &clear_cookie(SESSION_COOKIE_NAME, secure));
    append_set_cookie(headers, &clear_cookie(state.config().cookie_name, secure));
    response
}

/// Forced sign-out after the downstream API rejected the service token.
///
/// This is the only path that terminates a session on the bridge's initiative;
/// local cookie repairs never do.
pub async fn forced_sign_out<S>(state: &S, session: &Session, code: RemoteTokenCode) -> Response
where
    S: HasBridgeBackend,
{
    sign_out(state, session, SignOutReason::RemoteInvalidToken(code)).await
}
