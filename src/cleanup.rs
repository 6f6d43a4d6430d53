//! Scheduled cleanup of expired sessions, verification codes and idle
//! rate-limit buckets.

use crate::cache::Cache;
use crate::db::{Database, SessionRepository};
use crate::rate_limit::RateLimitConfig;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database, cache: &dyn Cache, rate_limit: &RateLimitConfig) {
    // Refresh sessions past their expiry can never be redeemed
    match db.sessions().delete_expired(Utc::now()).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired refresh sessions", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired refresh sessions: {}", e),
    }

    match cache.purge_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired verification codes", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up verification codes: {}", e),
    }

    let tracked = rate_limit.retain_recent();
    debug!("{} clients still tracked by the rate limiter", tracked);
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(
    db: Database,
    cache: Arc<dyn Cache>,
    rate_limit: Arc<RateLimitConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately and startup already ran a pass
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db, cache.as_ref(), &rate_limit).await;
        }
    })
}
