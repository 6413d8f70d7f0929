//! Session-to-service-token bridge for a browser dashboard.
//!
//! The dashboard trusts cookie-based sessions from an identity provider; the
//! downstream API trusts short-lived HS256 service tokens. This crate mints
//! those tokens from session identity, caches them per session, attaches
//! them to outgoing API calls and keeps the service-token cookie in line
//! with the live session at the edge.

pub mod api_client;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod gatekeeper;
pub mod interceptor;
pub mod jwt;
pub mod session;
pub mod token_cache;

use std::net::SocketAddr;
use std::sync::Arc;

use api_client::ApiClient;
use axum::{Router, middleware};
use config::BridgeConfig;
use dashboard::AppState;
use db::{Database, SqliteSessions};
use gatekeeper::{RouteRules, edge_gatekeeper};
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Token, cookie and environment settings resolved at startup
    pub bridge: BridgeConfig,
    /// Route classes and redirect targets for the gatekeeper
    pub routes: RouteRules,
    /// Downstream API client (None disables API forwarding)
    pub api: Option<ApiClient>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let state = AppState {
        config: Arc::new(config.bridge.clone()),
        sessions: SqliteSessions::new(config.db.clone()),
        routes: Arc::new(config.routes.clone()),
        api: config.api.clone(),
    };

    dashboard::router(&state.routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            edge_gatekeeper::<AppState>,
        ))
        .with_state(state)
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
