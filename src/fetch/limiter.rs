use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Shared fixed-delay rate limiter
///
/// All requests to the target host go through one limiter, so the
/// configured delay holds across every caller that clones it. The slot
/// holding the last request time stays locked while a caller sleeps,
/// which serializes waiters and keeps the spacing exact.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `delay_ms` between requests
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Sleeps out the remainder of the delay since the last request,
    /// then stamps the current time as the new last request
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_wait_is_immediate() {
        let limiter = RateLimiter::new(1000);
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_second_wait_enforces_delay() {
        let limiter = RateLimiter::new(50);
        limiter.wait().await;
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_zero_delay_never_sleeps() {
        let limiter = RateLimiter::new(0);
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_clones_share_the_delay() {
        let limiter = RateLimiter::new(50);
        let clone = limiter.clone();
        limiter.wait().await;
        let start = Instant::now();
        clone.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
