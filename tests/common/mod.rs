#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get as route_get,
};
use parking_lot::Mutex;
use serde_json::json;
use sessionbridge::{
    ServerConfig,
    api_client::{ApiClient, DEFAULT_API_TIMEOUT},
    config::{BridgeConfig, Environment},
    create_app,
    db::Database,
    gatekeeper::RouteRules,
    jwt::{self, Claims, Role, SigningSecret},
};
use url::Url;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-for-testing-only!";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub config: BridgeConfig,
}

/// Create a test app with an in-memory database and no downstream API.
pub async fn create_test_app() -> TestApp {
    build_test_app(Environment::Development, None).await
}

pub async fn create_test_app_with_api(api_base_url: Url) -> TestApp {
    build_test_app(Environment::Development, Some(api_base_url)).await
}

pub async fn build_test_app(environment: Environment, api_base_url: Option<Url>) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = BridgeConfig::new(environment, TEST_SECRET).expect("Invalid test secret");
    let api = api_base_url
        .map(|url| ApiClient::new(url, DEFAULT_API_TIMEOUT).expect("Failed to build API client"));

    let server_config = ServerConfig {
        db: db.clone(),
        bridge: config.clone(),
        routes: RouteRules::default(),
        api,
    };

    TestApp {
        app: create_app(&server_config),
        db,
        config,
    }
}

/// Create a live session for `subject` and return its id.
pub async fn create_session(db: &Database, subject: &str) -> String {
    let claims = Claims::new(subject, format!("{}@example.com", subject), Role::User);
    let expires_at = jwt::unix_now().unwrap() + 3600;
    db.sessions().create(&claims, expires_at).await.unwrap()
}

pub fn session_cookie(session_id: &str) -> String {
    format!("session_id={}", session_id)
}

pub fn session_and_service_cookie(session_id: &str, cookie_name: &str, token: &str) -> String {
    format!("session_id={}; {}={}", session_id, cookie_name, token)
}

pub fn get(uri: &str, cookie: Option<&str>) -> axum::http::Request<Body> {
    let mut builder = axum::http::Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Set-Cookie headers that write (not clear) the named cookie
pub fn cookie_writes(cookies: &[String], name: &str) -> Vec<String> {
    let prefix = format!("{}=", name);
    cookies
        .iter()
        .filter(|c| c.starts_with(&prefix) && !c.contains("Max-Age=0"))
        .cloned()
        .collect()
}

/// Check if cookies contain the named cookie being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    let prefix = format!("{}=;", name);
    cookies
        .iter()
        .any(|c| c.starts_with(&prefix) && c.contains("Max-Age=0"))
}

/// Token value carried by a Set-Cookie header.
pub fn cookie_value(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or_default()
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Fake downstream API
// =============================================================================

/// Stand-in for the downstream API: verifies bearer tokens with the shared
/// secret and records every Authorization header it receives.
#[derive(Clone)]
pub struct FakeApi {
    pub seen: Arc<Mutex<Vec<Option<String>>>>,
    secret: SigningSecret,
}

impl FakeApi {
    pub fn seen(&self) -> Vec<Option<String>> {
        self.seen.lock().clone()
    }
}

async fn fake_api_handler(
    State(api): State<FakeApi>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    api.seen.lock().push(auth.clone());

    match path.as_str() {
        "expired" => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "code": "token_expired" })),
            )
                .into_response();
        }
        "missing" => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response();
        }
        _ => {}
    }

    let Some(token) = auth
        .as_deref()
        .and_then(|a| a.strip_prefix("Bearer "))
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Missing credentials" })),
        )
            .into_response();
    };

    match jwt::decode(token, &api.secret) {
        Ok(claims) => Json(json!({ "path": path, "sub": claims.subject })).into_response(),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": "token_invalid" })),
        )
            .into_response(),
    }
}

/// Start the fake API on a random port.
pub async fn spawn_fake_api() -> (Url, FakeApi) {
    let api = FakeApi {
        seen: Arc::new(Mutex::new(Vec::new())),
        secret: SigningSecret::new(TEST_SECRET).unwrap(),
    };
    let router = Router::new()
        .route("/{*path}", route_get(fake_api_handler))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    let url = Url::parse(&format!("http://{}/", addr)).unwrap();
    (url, api)
}
