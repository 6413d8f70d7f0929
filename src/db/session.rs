//! Session storage and the bundled session materializer.
//!
//! Sessions are created by the identity provider; this store only reads them
//! back and keeps one cached service token per session.

use axum::http::HeaderMap;
use sqlx::sqlite::SqlitePool;

use super::Database;
use crate::auth::{SESSION_COOKIE_NAME, get_cookie};
use crate::jwt::{Claims, Role};
use crate::session::{Session, SessionError, SessionMaterializer};
use crate::token_cache::CachedToken;

/// A session row.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub id: String,
    pub subject: String,
    pub email: String,
    pub role: Role,
    pub expires_at: u64,
    pub service_token: Option<CachedToken>,
}

impl From<StoredSession> for Session {
    fn from(row: StoredSession) -> Self {
        Session {
            id: row.id,
            claims: Claims::new(row.subject, row.email, row.role),
            expires_at: row.expires_at,
            service_token: row.service_token,
        }
    }
}

/// Unix seconds as a SQLite integer, saturating at `i64::MAX`.
fn to_sql_seconds(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

type SessionRow = (String, String, String, String, i64, Option<String>, Option<i64>);

fn row_to_session(
    (id, subject, email, role, expires_at, token, token_expires_at): SessionRow,
) -> StoredSession {
    let service_token = match (token, token_expires_at) {
        (Some(token), Some(expires_at)) => Some(CachedToken {
            token,
            expires_at: expires_at.max(0) as u64,
        }),
        _ => None,
    };
    StoredSession {
        id,
        subject,
        email,
        role: Role::parse(&role),
        expires_at: expires_at.max(0) as u64,
        service_token,
    }
}

/// Store for provider sessions.
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a session for the given identity and return its id.
    pub async fn create(&self, claims: &Claims, expires_at: u64) -> Result<String, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO sessions (id, subject, email, role, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&claims.subject)
        .bind(&claims.email)
        .bind(claims.role.as_str())
        .bind(to_sql_seconds(expires_at))
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Get a session that has not yet expired.
    pub async fn get_live(
        &self,
        id: &str,
        now: u64,
    ) -> Result<Option<StoredSession>, sqlx::Error> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, subject, email, role, expires_at, service_token, service_token_expires_at FROM sessions WHERE id = ? AND expires_at > ?",
        )
        .bind(id)
        .bind(to_sql_seconds(now))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_session))
    }

    /// Replace the cached service token of a session.
    pub async fn store_token(&self, id: &str, token: &CachedToken) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET service_token = ?, service_token_expires_at = ? WHERE id = ?",
        )
        .bind(&token.token)
        .bind(to_sql_seconds(token.expires_at))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a session (sign out).
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all sessions that expired at or before `now`.
    pub async fn delete_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(to_sql_seconds(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Session materializer reading the provider's session cookie against SQLite.
#[derive(Clone)]
pub struct SqliteSessions {
    db: Database,
}

impl SqliteSessions {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn store_err(e: sqlx::Error) -> SessionError {
    SessionError::Store(e.to_string())
}

impl SessionMaterializer for SqliteSessions {
    async fn materialize(&self, headers: &HeaderMap) -> Result<Option<Session>, SessionError> {
        let Some(id) = get_cookie(headers, SESSION_COOKIE_NAME).map(str::to_owned) else {
            return Ok(None);
        };
        let now = crate::jwt::unix_now().map_err(|e| SessionError::Store(e.to_string()))?;

        let session = self
            .db
            .sessions()
            .get_live(&id, now)
            .await
            .map_err(store_err)?;
        Ok(session.map(Session::from))
    }

    async fn attach_token(&self, session_id: &str, token: &CachedToken) -> Result<(), SessionError> {
        self.db
            .sessions()
            .store_token(session_id, token)
            .await
            .map(|_| ())
            .map_err(store_err)
    }

    async fn end_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.db
            .sessions()
            .delete(session_id)
            .await
            .map(|_| ())
            .map_err(store_err)
    }
}
