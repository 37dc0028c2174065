use std::time::{Duration, Instant};

/// Nominatim usage policy: at most one request per second
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Gate that keeps outbound requests at least `min_interval` apart
///
/// Single-threaded: callers `wait()` before a request and `mark()` once it
/// has been sent.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time left before the next request may go out
    pub fn remaining(&self) -> Duration {
        self.last_request
            .map(|last| self.min_interval.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    /// Block until the minimum interval since the last request has elapsed
    pub fn wait(&self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            log::debug!("Rate limiting geocoding request for {:?}", remaining);
            std::thread::sleep(remaining);
        }
    }

    /// Record that a request was just issued
    pub fn mark(&mut self) {
        self.last_request = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MIN_REQUEST_INTERVAL)
    }
}
