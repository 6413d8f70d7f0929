//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use crate::ServerConfig;
use crate::api_client::ApiClient;
use crate::auth::SESSION_COOKIE_NAME;
use crate::config::{BridgeConfig, Environment};
use crate::db::Database;
use crate::gatekeeper::RouteRules;
use crate::jwt::{Claims, MAX_EXPIRES_AT, Role, unix_now};
use clap::Parser;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Upper bound for token and cookie lifetimes (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum SessionRole {
    #[default]
    User,
    Admin,
}

impl From<SessionRole> for Role {
    fn from(role: SessionRole) -> Self {
        match role {
            SessionRole::User => Role::User,
            SessionRole::Admin => Role::Admin,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sessionbridge",
    about = "Dashboard edge bridging browser sessions to API service tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file holding provider sessions
    #[arg(short, long, default_value = "sessionbridge.db")]
    pub database: String,

    /// Deployment environment (production enables Secure cookies)
    #[arg(short, long, env = "APP_ENV", default_value = "development")]
    pub environment: Environment,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Service token lifetime in seconds
    #[arg(long, env = "TOKEN_TTL_SECS", default_value = "3600", value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_SECS))]
    pub token_ttl_secs: u64,

    /// Service cookie Max-Age in seconds
    #[arg(long, env = "COOKIE_TTL_SECS", default_value = "604800", value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_SECS))]
    pub cookie_ttl_secs: u64,

    /// Upper bound on a session lookup before treating the request as signed out
    #[arg(long, default_value = "5000")]
    pub session_lookup_timeout_ms: u64,

    /// Base URL of the downstream API (e.g., "https://api.example.com/v1")
    #[arg(long, env = "API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// Timeout for downstream API calls in seconds
    #[arg(long, default_value = "10")]
    pub api_timeout_secs: u64,

    /// Create a session for this email on startup and print its cookie (development only)
    #[arg(long)]
    pub create_session: Option<String>,

    /// Role for the session created by --create-session
    #[arg(long, default_value = "user")]
    pub session_role: SessionRole,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(&secret).then_some(secret)
}

fn validate_jwt_secret(secret: &str) -> bool {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return false;
    }
    true
}

/// Parse and validate the downstream API base URL.
/// Returns None and logs an error if validation fails.
pub fn validate_api_base_url(api_base_url: &str, environment: Environment) -> Option<Url> {
    let url = match Url::parse(api_base_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %api_base_url, error = %e, "Invalid API base URL");
            return None;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        error!(url = %api_base_url, "API base URL must use http or https");
        return None;
    }

    // Service tokens are bearer credentials
    if environment == Environment::Production && url.scheme() != "https" {
        error!("API base URL must use HTTPS in production");
        return None;
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if any part of the configuration is invalid.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> Option<ServerConfig> {
    let bridge = match BridgeConfig::new(args.environment, jwt_secret.as_bytes()) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!(error = %e, "Invalid token configuration");
            return None;
        }
    };
    let bridge = bridge
        .with_token_ttl(Duration::from_secs(args.token_ttl_secs))
        .with_cookie_ttl(Duration::from_secs(args.cookie_ttl_secs))
        .with_session_lookup_timeout(Duration::from_millis(args.session_lookup_timeout_ms));

    let api = match args.api_base_url.as_deref() {
        Some(raw) => {
            let url = validate_api_base_url(raw, args.environment)?;
            match ApiClient::new(url, Duration::from_secs(args.api_timeout_secs)) {
                Ok(client) => Some(client),
                Err(e) => {
                    error!(error = %e, "Failed to create API client");
                    return None;
                }
            }
        }
        None => {
            info!("No API base URL configured, API forwarding disabled");
            None
        }
    };

    info!(
        environment = ?args.environment,
        cookie = bridge.cookie_name,
        token_ttl_secs = bridge.token_ttl.as_secs(),
        "Bridge configured"
    );

    Some(ServerConfig {
        db,
        bridge,
        routes: RouteRules::default(),
        api,
    })
}

/// Handle the --create-session flag: seed a session and print the cookie to use.
pub async fn handle_create_session(db: &Database, email: &str, role: Role, ttl: Duration) {
    let claims = Claims::new(Uuid::new_v4().to_string(), email, role);
    let now = match unix_now() {
        Ok(now) => now,
        Err(e) => {
            error!(error = %e, "Failed to read system time");
            std::process::exit(1);
        }
    };
    let Some(expires_at) = session_expiry(now, ttl) else {
        error!(ttl_secs = ttl.as_secs(), "Session lifetime out of range");
        std::process::exit(1);
    };

    match db.sessions().create(&claims, expires_at).await {
        Ok(id) => {
            println!();
            println!("Session created for {} ({})", email, claims.subject);
            println!("Cookie: {}={}", SESSION_COOKIE_NAME, id);
            println!();
        }
        Err(e) => {
            error!(error = %e, "Failed to create session");
            std::process::exit(1);
        }
    }
}

fn session_expiry(now: u64, ttl: Duration) -> Option<u64> {
    now.checked_add(ttl.as_secs())
        .filter(|expires_at| *expires_at <= MAX_EXPIRES_AT)
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
