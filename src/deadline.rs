//! Per-request deadlines.
//!
//! A `Deadline` is fixed when a request arrives and handed to every service
//! operation, which wraps each store and cache call in [`Deadline::run`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Header a caller may send to shorten the server's default deadline (milliseconds).
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// Drive `fut` to completion unless the deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DeadlineExceeded>
    where
        F: Future<Output = T>,
    {
        match self.0 {
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

/// Work out the effective request timeout.
///
/// A caller-supplied header value can only shorten `default`; values that are
/// missing, unparseable or zero are ignored.
pub fn effective_timeout(default: Duration, header: Option<&str>) -> Duration {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
        .map_or(default, |requested| requested.min(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_before_deadline() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let value = deadline
            .run(async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                7
            })
            .await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let deadline = Deadline::after(Duration::from_millis(100));
        let result = deadline
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(result, Err(DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_never_expires() {
        let deadline = Deadline::none();
        let result = deadline
            .run(tokio::time::sleep(Duration::from_secs(3600)))
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_effective_timeout() {
        let default = Duration::from_secs(10);
        assert_eq!(effective_timeout(default, None), default);
        assert_eq!(
            effective_timeout(default, Some("250")),
            Duration::from_millis(250)
        );
        // Cannot extend past the server default
        assert_eq!(effective_timeout(default, Some("60000")), default);
        assert_eq!(effective_timeout(default, Some("0")), default);
        assert_eq!(effective_timeout(default, Some("soon")), default);
    }
}
