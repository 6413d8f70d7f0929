//! Edge gatekeeper.
//!
//! Runs once per inbound request before any handler. It redirects by route
//! class and session presence, and for protected requests keeps the
//! service-token cookie in line with the live session identity:
//!
//! | Route class | Session | Action                         |
//! |-------------|---------|--------------------------------|
//! | auth-only   | yes     | redirect to home               |
//! | protected   | no      | redirect to login              |
//! | protected   | yes     | reconcile the service cookie   |
//! | other       | any     | proceed                        |
//!
//! The cookie is written only when it is absent, undecodable, or names a
//! different subject than the session.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error, info, warn};

use crate::auth::{HasBridgeBackend, append_set_cookie, get_cookie, service_cookie};
use crate::config::BridgeConfig;
use crate::jwt::{self, Claims, SigningSecret, TokenError};
use crate::session::{Session, lookup_session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Sign-in pages that a signed-in user should skip
    AuthOnly,
    /// Pages that require a session
    Protected,
    Public,
}

/// Route classification and redirect targets.
#[derive(Debug, Clone)]
pub struct RouteRules {
    pub login_path: String,
    /// Where signed-in users land
    pub home_path: String,
    /// Exact paths only reachable while signed out
    pub auth_only: Vec<String>,
    /// Path prefixes that require a session
    pub protected_prefixes: Vec<String>,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/dashboard".to_string(),
            auth_only: vec!["/login".to_string(), "/signup".to_string()],
            protected_prefixes: vec!["/dashboard".to_string()],
        }
    }
}

impl RouteRules {
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = match path.len() {
            0 | 1 => path,
            _ => path.trim_end_matches('/'),
        };

        if self.auth_only.iter().any(|p| p == path) {
            return RouteClass::AuthOnly;
        }

        let protected = self.protected_prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if protected {
            RouteClass::Protected
        } else {
            RouteClass::Public
        }
    }
}

/// What the gatekeeper does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    RedirectHome,
    RedirectLogin,
    /// Protected request with a live session
    Reconcile(Session),
    Proceed,
}

pub fn decide(class: RouteClass, session: Option<Session>) -> GateDecision {
    match (class, session) {
        (RouteClass::AuthOnly, Some(_)) => GateDecision::RedirectHome,
        (RouteClass::Protected, None) => GateDecision::RedirectLogin,
        (RouteClass::Protected, Some(session)) => GateDecision::Reconcile(session),
        _ => GateDecision::Proceed,
    }
}

/// Why the service cookie needs rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieRepair {
    Absent,
    /// Malformed, expired, or signed with another key
    Undecodable,
    /// Cookie was minted for a different identity than the live session
    SubjectMismatch { stale_subject: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Keep,
    Rewrite(CookieRepair),
}

/// Compare an existing service cookie with the live session's claims.
pub fn reconcile(existing: Option<&str>, live: &Claims, secret: &SigningSecret) -> Reconciliation {
    let Some(token) = existing.filter(|t| !t.is_empty()) else {
        return Reconciliation::Rewrite(CookieRepair::Absent);
    };

    match jwt::decode(token, secret) {
        Err(_) => Reconciliation::Rewrite(CookieRepair::Undecodable),
        Ok(decoded) if decoded.subject != live.subject => {
            Reconciliation::Rewrite(CookieRepair::SubjectMismatch {
                stale_subject: decoded.subject,
            })
        }
        Ok(_) => Reconciliation::Keep,
    }
}

/// Mint a replacement service cookie for the live claims.
pub fn repaired_cookie(config: &BridgeConfig, claims: &Claims) -> Result<String, TokenError> {
    let minted = jwt::mint(claims, &config.secret, config.token_ttl)?;
    Ok(service_cookie(config, &minted.token))
}

/// Session materialized by the gatekeeper, passed to handlers through
/// request extensions.
#[derive(Debug, Clone)]
pub struct GatedSession(pub Session);

/// Work out the Set-Cookie value (if any) for a protected request.
fn cookie_write_for(
    headers: &HeaderMap,
    session: &Session,
    config: &BridgeConfig,
) -> Option<String> {
    let existing = get_cookie(headers, config.cookie_name);
    let repair = match reconcile(existing, &session.claims, &config.secret) {
        Reconciliation::Keep => return None,
        Reconciliation::Rewrite(repair) => repair,
    };

    match &repair {
        CookieRepair::Absent => {
            debug!(subject = %session.claims.subject, "Issuing service cookie")
        }
        CookieRepair::Undecodable => {
            info!(subject = %session.claims.subject, "Replacing undecodable service cookie")
        }
        CookieRepair::SubjectMismatch { stale_subject } => warn!(
            security = true,
            stale_subject = %stale_subject,
            subject = %session.claims.subject,
            "Service cookie belongs to a different identity, replacing"
        ),
    }

    match repaired_cookie(config, &session.claims) {
        Ok(cookie) => Some(cookie),
        Err(e) => {
            error!(error = %e, "Failed to mint service token for cookie");
            None
        }
    }
}

/// Whether the handler already set (or cleared) the named cookie.
fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    let prefix = format!("{}=", name);
    headers
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Middleware running the gatekeeper in front of every route.
pub async fn edge_gatekeeper<S>(State(state): State<S>, mut request: Request, next: Next) -> Response
where
    S: HasBridgeBackend + Clone + Send + Sync + 'static,
{
    let class = state.routes().classify(request.uri().path());
    if class == RouteClass::Public {
        return next.run(request).await;
    }

    let config = state.config();
    let session = lookup_session(
        state.sessions(),
        request.headers(),
        config.session_lookup_timeout,
    )
    .await;

    let session = match decide(class, session) {
        GateDecision::RedirectHome => {
            return Redirect::temporary(&state.routes().home_path).into_response();
        }
        GateDecision::RedirectLogin => {
            debug!(path = %request.uri().path(), "No session, redirecting to login");
            return Redirect::temporary(&state.routes().login_path).into_response();
        }
        GateDecision::Proceed => return next.run(request).await,
        GateDecision::Reconcile(session) => session,
    };

    let set_cookie = cookie_write_for(request.headers(), &session, config);
    request.extensions_mut().insert(GatedSession(session));

    let mut response = next.run(request).await;
    if let Some(cookie) = set_cookie {
        if !sets_cookie(response.headers(), config.cookie_name) {
            append_set_cookie(response.headers_mut(), &cookie);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::jwt::Role;
    use crate::session::testing::session;

    fn config() -> BridgeConfig {
        BridgeConfig::new(Environment::Development, b"test-secret-key-for-testing").unwrap()
    }

    #[test]
    fn test_classify_routes() {
        let rules = RouteRules::default();
        assert_eq!(rules.classify("/login"), RouteClass::AuthOnly);
        assert_eq!(rules.classify("/login/"), RouteClass::AuthOnly);
        assert_eq!(rules.classify("/signup"), RouteClass::AuthOnly);
        assert_eq!(rules.classify("/dashboard"), RouteClass::Protected);
        assert_eq!(rules.classify("/dashboard/api/tasks"), RouteClass::Protected);
        assert_eq!(rules.classify("/dashboards"), RouteClass::Public);
        assert_eq!(rules.classify("/health"), RouteClass::Public);
        assert_eq!(rules.classify("/"), RouteClass::Public);
    }

    #[test]
    fn test_decide_table() {
        let s = session("s1", "u-1");
        assert_eq!(
            decide(RouteClass::AuthOnly, Some(s.clone())),
            GateDecision::RedirectHome
        );
        assert_eq!(decide(RouteClass::AuthOnly, None), GateDecision::Proceed);
        assert_eq!(decide(RouteClass::Protected, None), GateDecision::RedirectLogin);
        assert_eq!(
            decide(RouteClass::Protected, Some(s.clone())),
            GateDecision::Reconcile(s.clone())
        );
        assert_eq!(decide(RouteClass::Public, Some(s)), GateDecision::Proceed);
        assert_eq!(decide(RouteClass::Public, None), GateDecision::Proceed);
    }

    #[test]
    fn test_reconcile_absent() {
        let config = config();
        let live = Claims::new("u-1", "u-1@example.com", Role::User);
        assert_eq!(
            reconcile(None, &live, &config.secret),
            Reconciliation::Rewrite(CookieRepair::Absent)
        );
        assert_eq!(
            reconcile(Some(""), &live, &config.secret),
            Reconciliation::Rewrite(CookieRepair::Absent)
        );
    }

    #[test]
    fn test_reconcile_undecodable() {
        let config = config();
        let live = Claims::new("u-1", "u-1@example.com", Role::User);
        assert_eq!(
            reconcile(Some("garbage"), &live, &config.secret),
            Reconciliation::Rewrite(CookieRepair::Undecodable)
        );
    }

    #[test]
    fn test_reconcile_mismatch() {
        let config = config();
        let old = Claims::new("u-old", "old@example.com", Role::User);
        let live = Claims::new("u-new", "new@example.com", Role::User);
        let stale = jwt::mint(&old, &config.secret, config.token_ttl).unwrap();

        assert_eq!(
            reconcile(Some(&stale.token), &live, &config.secret),
            Reconciliation::Rewrite(CookieRepair::SubjectMismatch {
                stale_subject: "u-old".to_string()
            })
        );
    }

    #[test]
    fn test_reconcile_match_keeps_cookie() {
        let config = config();
        let live = Claims::new("u-1", "u-1@example.com", Role::User);
        let current = jwt::mint(&live, &config.secret, config.token_ttl).unwrap();

        assert_eq!(
            reconcile(Some(&current.token), &live, &config.secret),
            Reconciliation::Keep
        );
    }

    #[test]
    fn test_cookie_write_for_mismatch_decodes_to_live_subject() {
        let config = config();
        let live = session("s1", "u-new");
        let old = Claims::new("u-old", "old@example.com", Role::User);
        let stale = jwt::mint(&old, &config.secret, config.token_ttl).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            format!("{}={}", config.cookie_name, stale.token)
                .parse()
                .unwrap(),
        );

        let cookie = cookie_write_for(&headers, &live, &config).unwrap();
        let value = cookie
            .strip_prefix("service_token=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        assert_eq!(jwt::decode(value, &config.secret).unwrap().subject, "u-new");
    }

    #[test]
    fn test_sets_cookie_detection() {
        let mut headers = HeaderMap::new();
        append_set_cookie(&mut headers, "session_id=; Max-Age=0");
        assert!(!sets_cookie(&headers, "service_token"));
        append_set_cookie(&mut headers, "service_token=; Max-Age=0");
        assert!(sets_cookie(&headers, "service_token"));
    }
}
