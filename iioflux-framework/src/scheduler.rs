//! Interruptible sleeping between polling ticks.

use std::time::Duration;

use tokio::time::Instant;

use crate::shutdown::StopToken;

/// Longest single wait between two checks of the stop flag.
pub const DEFAULT_GRANULARITY: Duration = Duration::from_secs(1);

/// Sleeps in bounded increments, returning early once a stop is requested.
///
/// Shutdown latency is bounded by the granularity, whatever the polling
/// period.
#[derive(Debug, Clone)]
pub struct Scheduler {
    token: StopToken,
    granularity: Duration,
}

impl Scheduler {
    /// Create a scheduler observing `token`, checking it once per second.
    pub fn new(token: StopToken) -> Self {
        Self::with_granularity(token, DEFAULT_GRANULARITY)
    }

    /// Create a scheduler with a custom check granularity.
    ///
    /// A zero granularity is raised to one millisecond.
    pub fn with_granularity(token: StopToken, granularity: Duration) -> Self {
        Self {
            token,
            granularity: granularity.max(Duration::from_millis(1)),
        }
    }

    /// Whether a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.token.is_stop_requested()
    }

    /// Sleep for `duration`, or less if a stop is requested meanwhile.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the sleep was
    /// cut short (or never started) because of a stop request.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        tracing::debug!(secs = duration.as_secs_f64(), "Sleeping");

        loop {
            if self.token.is_stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep((deadline - now).min(self.granularity)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_full_sleep_without_stop() {
        let scheduler = Scheduler::new(StopToken::new());
        let start = Instant::now();

        assert!(scheduler.sleep(Duration::from_secs(60)).await);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_duration_is_exact() {
        let scheduler = Scheduler::new(StopToken::new());
        let start = Instant::now();

        assert!(scheduler.sleep(Duration::from_millis(2500)).await);
        assert_eq!(start.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_within_granularity() {
        let token = StopToken::new();
        let scheduler = Scheduler::new(token.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            token.request_stop();
        });

        let start = Instant::now();
        assert!(!scheduler.sleep(Duration::from_secs(60)).await);

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(2500), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(3500), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_stopped_returns_immediately() {
        let token = StopToken::new();
        token.request_stop();
        let scheduler = Scheduler::new(token);

        let start = Instant::now();
        assert!(!scheduler.sleep(Duration::from_secs(60)).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_granularity() {
        let token = StopToken::new();
        let scheduler = Scheduler::with_granularity(token.clone(), Duration::from_millis(100));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1050)).await;
            token.request_stop();
        });

        let start = Instant::now();
        assert!(!scheduler.sleep(Duration::from_secs(10)).await);
        assert!(start.elapsed() <= Duration::from_millis(1150));
    }
}
