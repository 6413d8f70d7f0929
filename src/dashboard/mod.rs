//! Dashboard routes consuming the bridge.
//!
//! Rendering is out of scope; these handlers only show how pages read the
//! current session and call the downstream API with a service token.

mod error;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::api_client::{ApiClient, ApiClientError};
use crate::auth::{CurrentSession, HasBridgeBackend, SignOutReason, forced_sign_out, sign_out};
use crate::config::BridgeConfig;
use crate::db::SqliteSessions;
use crate::gatekeeper::RouteRules;
use crate::impl_has_bridge_backend;
use crate::interceptor::{RequestInterceptor, SessionTokenSource};
use crate::jwt::Role;
use crate::session::refresh_session_token;

pub use error::DashboardError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub sessions: SqliteSessions,
    pub routes: Arc<RouteRules>,
    /// Downstream API client, if an API base URL is configured
    pub api: Option<ApiClient>,
}

impl_has_bridge_backend!(AppState, SqliteSessions);

/// Create the dashboard router.
pub fn router(routes: &RouteRules) -> Router<AppState> {
    Router::new()
        .route("/", get(Redirect::temporary(&routes.home_path)))
        .route(&routes.login_path, get(login_page))
        .route("/signup", get(signup_page))
        .route("/logout", post(logout))
        .route("/health", get(health))
        .route(&routes.home_path, get(dashboard_home))
        .route(
            &format!("{}/api/{{*path}}", routes.home_path),
            get(api_proxy),
        )
}

async fn health() -> &'static str {
    "ok"
}

async fn login_page() -> Html<&'static str> {
    Html("<!doctype html><title>Sign in</title><p>Sign in with your identity provider.</p>")
}

async fn signup_page() -> Html<&'static str> {
    Html("<!doctype html><title>Sign up</title><p>Create an account with your identity provider.</p>")
}

#[derive(Serialize)]
struct SessionSummary {
    subject: String,
    email: String,
    role: Role,
    /// Unix seconds at which the current service token goes stale
    service_token_expires_at: u64,
}

async fn dashboard_home(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
) -> Result<Json<SessionSummary>, DashboardError> {
    let token = refresh_session_token(state.sessions(), &mut session, state.config())
        .await
        .map_err(|e| DashboardError::internal("Failed to obtain service token", e))?;

    Ok(Json(SessionSummary {
        subject: session.claims.subject,
        email: session.claims.email,
        role: session.claims.role,
        service_token_expires_at: token.expires_at,
    }))
}

/// Forward a GET to the downstream API on behalf of the current session.
async fn api_proxy(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(api) = state.api.as_ref() else {
        return DashboardError::Unavailable("API not configured".into()).into_response();
    };

    let source = SessionTokenSource::new(state.sessions(), &headers, state.config())
        .with_session(session.clone());
    let interceptor = RequestInterceptor::new(source);

    match api.get_json::<serde_json::Value, _>(&interceptor, &path).await {
        Ok(body) => Json(body).into_response(),
        Err(ApiClientError::RemoteInvalidToken(code)) => {
            forced_sign_out(&state, &session, code).await
        }
        Err(e) => DashboardError::from(e).into_response(),
    }
}

async fn logout(State(state): State<AppState>, CurrentSession(session): CurrentSession) -> Response {
    sign_out(&state, &session, SignOutReason::UserRequested).await
}
