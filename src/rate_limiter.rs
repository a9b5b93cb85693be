use rand::Rng;
use std::ops::Range;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest pause any configured rate or jitter can produce.
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Seconds as a `Duration`, capped at `MAX_INTERVAL`. Negative or NaN is zero.
pub fn capped_secs(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => duration.min(MAX_INTERVAL),
        Err(_) if secs > 0.0 => MAX_INTERVAL,
        Err(_) => Duration::ZERO,
    }
}

/// Minimum gap between requests at `requests_per_second`; zero disables pacing.
pub fn interval_for(requests_per_second: f64) -> Duration {
    if requests_per_second > 0.0 {
        capped_secs(1.0 / requests_per_second)
    } else {
        Duration::ZERO
    }
}

/// Per-site request pacing. Each scraper owns its own instance; nothing is
/// shared between sites or threads.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    jitter_secs: Range<f64>,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub const DEFAULT_JITTER: Range<f64> = 0.5..1.5;

    pub fn new(requests_per_second: f64) -> Self {
        Self {
            min_interval: interval_for(requests_per_second),
            jitter_secs: Self::DEFAULT_JITTER,
            last_call: None,
        }
    }

    pub fn with_jitter(mut self, jitter_secs: Range<f64>) -> Self {
        self.jitter_secs = jitter_secs;
        self
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the minimum interval since the previous call has passed,
    /// plus a random jitter. The first call never waits.
    pub fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let sleep_for = self.min_interval - elapsed + self.jitter();
                debug!("Rate limiting: sleeping {:.2}s", sleep_for.as_secs_f64());
                thread::sleep(sleep_for);
            }
        }
        self.last_call = Some(Instant::now());
    }

    fn jitter(&self) -> Duration {
        let (start, end) = (self.jitter_secs.start, self.jitter_secs.end);
        if !(start >= 0.0 && start < end && end.is_finite()) {
            return Duration::ZERO;
        }
        capped_secs(rand::thread_rng().gen_range(start..end))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(0.33)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_does_not_wait() {
        let mut limiter = RateLimiter::new(0.5).with_jitter(0.0..0.001);
        let start = Instant::now();
        limiter.wait_if_needed();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn consecutive_calls_respect_interval() {
        let mut limiter = RateLimiter::new(20.0).with_jitter(0.001..0.002);
        limiter.wait_if_needed();
        let first = Instant::now();
        limiter.wait_if_needed();
        let gap = first.elapsed();
        assert!(gap >= Duration::from_millis(50));
        assert!(gap < Duration::from_millis(50 + 500));
    }

    #[test]
    fn no_wait_after_interval_elapsed() {
        let mut limiter = RateLimiter::new(50.0).with_jitter(0.5..1.5);
        limiter.wait_if_needed();
        thread::sleep(Duration::from_millis(30));
        let start = Instant::now();
        limiter.wait_if_needed();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn interval_from_rate() {
        assert_eq!(RateLimiter::new(2.0).min_interval(), Duration::from_millis(500));
        assert_eq!(RateLimiter::new(0.0).min_interval(), Duration::ZERO);
        assert_eq!(RateLimiter::new(-1.0).min_interval(), Duration::ZERO);
        assert_eq!(RateLimiter::new(f64::NAN).min_interval(), Duration::ZERO);
    }

    #[test]
    fn tiny_rates_are_capped() {
        assert_eq!(RateLimiter::new(1e-300).min_interval(), MAX_INTERVAL);
        assert_eq!(RateLimiter::new(f64::MIN_POSITIVE).min_interval(), MAX_INTERVAL);
        assert_eq!(interval_for(1e-300), MAX_INTERVAL);
        assert_eq!(capped_secs(f64::INFINITY), MAX_INTERVAL);
        assert_eq!(capped_secs(f64::NAN), Duration::ZERO);
        assert_eq!(capped_secs(-2.0), Duration::ZERO);
    }

    #[test]
    fn jitter_is_bounded() {
        let limiter = RateLimiter::new(1.0).with_jitter(0.0..1e300);
        assert!(limiter.jitter() <= MAX_INTERVAL);
        let limiter = RateLimiter::new(1.0).with_jitter(0.0..f64::INFINITY);
        assert_eq!(limiter.jitter(), Duration::ZERO);
        let limiter = RateLimiter::new(1.0).with_jitter(2.0..1.0);
        assert_eq!(limiter.jitter(), Duration::ZERO);
    }
}
