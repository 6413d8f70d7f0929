//! Scheduled cleanup of expired sessions.

use crate::db::Database;
use crate::jwt::unix_now;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    let now = match unix_now() {
        Ok(now) => now,
        Err(e) => {
            error!("Skipping cleanup: {}", e);
            return;
        }
    };

    // Expired sessions take their cached service tokens with them
    match db.sessions().delete_expired(now).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired sessions", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired sessions: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{Claims, Role};

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_sessions() {
        let db = Database::open(":memory:").await.unwrap();
        let claims = Claims::new("u-1", "alice@example.com", Role::User);
        let now = unix_now().unwrap();

        let expired = db.sessions().create(&claims, now - 10).await.unwrap();
        let live = db.sessions().create(&claims, now + 3600).await.unwrap();

        run_cleanup(&db).await;

        assert!(!db.sessions().delete(&expired).await.unwrap());
        assert!(db.sessions().get_live(&live, now).await.unwrap().is_some());
    }
}
