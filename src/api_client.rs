//! Client for the downstream API.
//!
//! Credentials come from a [`RequestInterceptor`]; this client only sends
//! the call and classifies the response. A response carrying one of the
//! API's token invalidity codes is reported as
//! [`ApiClientError::RemoteInvalidToken`], which callers turn into a forced
//! sign-out.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::interceptor::{RequestInterceptor, TokenSource};

/// Default timeout for downstream calls.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

/// Invalidity codes the downstream API uses for bad service tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTokenCode {
    Expired,
    Invalid,
}

impl RemoteTokenCode {
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "token_expired" => Some(Self::Expired),
            "token_invalid" => Some(Self::Invalid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "token_expired",
            Self::Invalid => "token_invalid",
        }
    }
}

/// Error body returned by the downstream API.
#[derive(Debug, Default, Deserialize)]
struct RemoteErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug)]
pub enum ApiClientError {
    /// The API rejected the service token itself
    RemoteInvalidToken(RemoteTokenCode),
    /// Any other non-success response
    Status { status: StatusCode, message: String },
    /// The request never produced a response
    Transport(reqwest::Error),
    /// The response body was not the expected JSON
    Body(reqwest::Error),
    /// The path could not be joined onto the base URL
    InvalidPath(String),
}

impl std::fmt::Display for ApiClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiClientError::RemoteInvalidToken(code) => {
                write!(f, "API rejected service token: {}", code.as_str())
            }
            ApiClientError::Status { status, message } => {
                write!(f, "API returned {}: {}", status, message)
            }
            ApiClientError::Transport(e) => write!(f, "API request failed: {}", e),
            ApiClientError::Body(e) => write!(f, "Invalid API response body: {}", e),
            ApiClientError::InvalidPath(p) => write!(f, "Invalid API path: {}", p),
        }
    }
}

impl std::error::Error for ApiClientError {}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    fn url_for(&self, path: &str) -> Result<Url, ApiClientError> {
        let path = path.trim_start_matches('/');
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .map_err(|_| ApiClientError::InvalidPath(path.to_string()))
    }

    /// GET a JSON resource with the interceptor's bearer credential.
    pub async fn get_json<T, S>(
        &self,
        interceptor: &RequestInterceptor<S>,
        path: &str,
    ) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
        S: TokenSource,
    {
        let url = self.url_for(path)?;
        debug!(url = %url, "Calling API");

        let request = interceptor.apply(self.http.get(url)).await;
        let response = request.send().await.map_err(ApiClientError::Transport)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(ApiClientError::Body);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

/// Map a non-success response to an error, recognizing token invalidity codes.
pub fn classify_failure(status: StatusCode, body: &str) -> ApiClientError {
    let parsed: RemoteErrorBody = serde_json::from_str(body).unwrap_or_default();

    if let Some(code) = parsed.code.as_deref().and_then(RemoteTokenCode::parse) {
        warn!(status = status.as_u16(), code = code.as_str(), "API rejected service token");
        return ApiClientError::RemoteInvalidToken(code);
    }

    let message = parsed
        .error
        .or(parsed.code)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
    ApiClientError::Status { status, message }
}
