//! Shared error handling for dashboard endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::api_client::ApiClientError;

/// Dashboard error type with automatic response conversion.
#[derive(Debug)]
pub enum DashboardError {
    BadRequest(String),
    BadGateway(String),
    Unavailable(String),
    Upstream(StatusCode, String),
    Internal(String),
}

impl DashboardError {
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal(context.into())
    }
}

impl From<ApiClientError> for DashboardError {
    fn from(e: ApiClientError) -> Self {
        match e {
            ApiClientError::Status { status, message } => Self::Upstream(status, message),
            ApiClientError::InvalidPath(path) => {
                Self::BadRequest(format!("Invalid API path: {}", path))
            }
            ApiClientError::Transport(e) => {
                error!("API request failed: {}", e);
                Self::BadGateway("API unreachable".into())
            }
            ApiClientError::Body(e) => {
                error!("Invalid API response: {}", e);
                Self::BadGateway("Invalid API response".into())
            }
            // Callers sign the user out before getting here
            ApiClientError::RemoteInvalidToken(code) => {
                Self::Upstream(StatusCode::UNAUTHORIZED, code.as_str().into())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            DashboardError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            DashboardError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            DashboardError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            DashboardError::Upstream(status, msg) => (status, msg),
            DashboardError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
