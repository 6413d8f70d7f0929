//! Tests for startup validation and the background server entry point.

mod common;

use std::process::{Command, Stdio};

use common::*;
use sessionbridge::{ServerConfig, gatekeeper::RouteRules, start_server};

fn run_bin(envs: &[(&str, &str)], args: &[&str]) -> (bool, String) {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sessionbridge"));
    command
        .env_remove("JWT_SECRET")
        .env_remove("API_BASE_URL")
        .env_remove("APP_ENV")
        .args(args)
        .stderr(Stdio::piped())
        .stdout(Stdio::piped());
    for (key, value) in envs {
        command.env(key, value);
    }
    let output = command.output().expect("Failed to run binary");

    // tracing logs to stdout by default
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    (output.status.success(), combined)
}

#[test]
fn test_missing_jwt_secret_exits_with_error() {
    let (success, output) = run_bin(&[], &[]);

    assert!(!success, "Should exit with error when JWT_SECRET is missing");
    assert!(
        output.contains("JWT_SECRET") && output.contains("required"),
        "Should mention JWT_SECRET is required, got: {}",
        output
    );
}

#[test]
fn test_short_jwt_secret_exits_with_error() {
    let (success, output) = run_bin(&[("JWT_SECRET", "too-short")], &[]);

    assert!(!success, "Should exit with error for a short secret");
    assert!(
        output.contains("shorter than"),
        "Should mention the minimum length, got: {}",
        output
    );
}

#[test]
fn test_plain_http_api_rejected_in_production() {
    let db_path = std::env::temp_dir().join(format!(
        "sessionbridge-startup-{}.db",
        std::process::id()
    ));
    let db_path = db_path.to_string_lossy().to_string();

    let (success, output) = run_bin(
        &[
            ("JWT_SECRET", "a-long-enough-secret-for-startup-tests"),
            ("APP_ENV", "production"),
            ("API_BASE_URL", "http://api.example.com"),
        ],
        &["--database", &db_path],
    );
    let _ = std::fs::remove_file(&db_path);

    assert!(!success, "Should refuse a plain HTTP API in production");
    assert!(
        output.contains("HTTPS"),
        "Should mention HTTPS, got: {}",
        output
    );
}

#[tokio::test]
async fn test_start_server_serves_health() {
    let t = create_test_app().await;
    let config = ServerConfig {
        db: t.db.clone(),
        bridge: t.config.clone(),
        routes: RouteRules::default(),
        api: None,
    };

    let (handle, addr) = start_server(config, 0).await.unwrap();

    let body = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");

    handle.abort();
}
