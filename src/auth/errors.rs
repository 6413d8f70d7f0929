//! Authentication rejections.

use axum::response::{IntoResponse, Redirect, Response};

/// Rejection for dashboard routes without a session: redirect to login.
#[derive(Debug)]
pub struct AuthRedirect {
    pub login_path: String,
}

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        Redirect::temporary(&self.login_path).into_response()
    }
}
