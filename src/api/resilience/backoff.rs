//! Bounded polling with exponential backoff
//!
//! Used for the asynchronous retrieve and deploy jobs. Each wait is a tokio
//! suspend point, so dropping the future stops polling; the remote job itself
//! keeps running.

use std::future::Future;
use std::time::Duration;

use log::debug;
use rand::Rng;
use tokio::time::Instant;

/// Configuration for poll pacing
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
    pub max_wait: Duration,
    pub jitter: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(15),
            backoff_multiplier: 1.5,
            max_wait: Duration::from_secs(600),
            jitter: true,
        }
    }
}

/// Result of a bounded poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// The check reported completion
    Finished(T),
    /// `max_wait` elapsed; carries the last value observed
    TimedOut(T),
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    config: PollConfig,
}

impl PollPolicy {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Run `check` until `is_done` accepts its value or the wait budget runs out.
    /// Errors from `check` end polling immediately.
    pub async fn poll<F, Fut, T, E, D>(&self, mut check: F, is_done: D) -> Result<PollOutcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        D: Fn(&T) -> bool,
    {
        let start = Instant::now();
        let mut attempt = 1;

        loop {
            let value = check().await?;
            if is_done(&value) {
                return Ok(PollOutcome::Finished(value));
            }

            let elapsed = start.elapsed();
            if elapsed >= self.config.max_wait {
                debug!("Polling gave up after {:?} ({} checks)", elapsed, attempt);
                return Ok(PollOutcome::TimedOut(value));
            }

            let delay = self
                .calculate_delay(attempt)
                .min(self.config.max_wait - elapsed);
            debug!("Check {} not finished, waiting {:?}", attempt, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Calculate exponential backoff delay with optional jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.config.interval.as_millis() as f64)
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let mut delay = Duration::from_millis(delay_ms as u64);

        if delay > self.config.max_interval {
            delay = self.config.max_interval;
        }

        if self.config.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            let jittered_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
            delay = Duration::from_millis(jittered_ms);
        }

        delay
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_wait: Duration) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            max_wait,
            jitter: false,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let policy = PollPolicy::new(PollConfig {
            interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            max_wait: Duration::from_secs(60),
            jitter: false,
        });

        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_interval_cap() {
        let policy = PollPolicy::new(PollConfig {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            max_wait: Duration::from_secs(60),
            jitter: false,
        });

        assert_eq!(policy.calculate_delay(5), Duration::from_secs(5));
        assert_eq!(policy.calculate_delay(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_poll_finishes() {
        let policy = PollPolicy::new(fast_config(Duration::from_secs(5)));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = policy
            .poll(
                || {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok::<_, String>(n) }
                },
                |n| *n >= 3,
            )
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Finished(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out_with_last_value() {
        let policy = PollPolicy::new(fast_config(Duration::from_millis(20)));

        let outcome = policy
            .poll(|| async { Ok::<_, String>("InProgress") }, |_| false)
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut("InProgress"));
    }

    #[tokio::test]
    async fn test_poll_stops_on_error() {
        let policy = PollPolicy::new(fast_config(Duration::from_secs(5)));
        let result = policy
            .poll(|| async { Err::<u32, _>("boom".to_string()) }, |_| true)
            .await;
        assert_eq!(result.unwrap_err(), "boom");
    }
}
