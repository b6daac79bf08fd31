//! Sliding-window rate limiter for outbound LLM requests.
//!
//! Tracks request instants over a 60-second window. `acquire` waits until
//! a slot frees up, or fails when the caller's deadline would elapse first.
//! The window is process-wide state behind a single mutex.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);

/// Refused because the wait would overrun the caller's deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitExceedsDeadline;

/// Sliding-window limiter: at most `max_per_minute` acquisitions in any
/// 60-second span.
pub struct RateLimiter {
    window: Mutex<VecDeque<Instant>>,
    max_per_minute: usize,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            window: Mutex::new(VecDeque::new()),
            max_per_minute: max_per_minute.max(1) as usize,
        }
    }

    /// Wait for a request slot. Returns an error without waiting if the
    /// required wait would overrun `deadline`.
    pub async fn acquire(&self, deadline: Option<Instant>) -> Result<(), WaitExceedsDeadline> {
        loop {
            let wait = {
                let mut window = self.window.lock().expect("rate limiter lock poisoned");
                let now = Instant::now();

                while window
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= WINDOW)
                {
                    window.pop_front();
                }

                if window.len() < self.max_per_minute {
                    window.push_back(now);
                    return Ok(());
                }

                // Full: wait until the oldest entry leaves the window
                let oldest = *window.front().expect("window is non-empty");
                (oldest + WINDOW).saturating_duration_since(now)
            };

            if let Some(deadline) = deadline {
                if Instant::now() + wait > deadline {
                    return Err(WaitExceedsDeadline);
                }
            }

            debug!(wait_ms = wait.as_millis() as u64, "Rate limiter waiting for a slot");
            tokio::time::sleep(wait).await;
        }
    }

    /// How many slots are currently used (for stats and tests).
    pub fn in_flight(&self) -> usize {
        let mut window = self.window.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= WINDOW)
        {
            window.pop_front();
        }
        window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_under_limit_is_immediate() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            limiter.acquire(None).await.unwrap();
        }
        assert_eq!(limiter.in_flight(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_over_limit_waits_for_window() {
        let limiter = RateLimiter::new(2);
        limiter.acquire(None).await.unwrap();
        limiter.acquire(None).await.unwrap();

        // Third acquisition must wait ~60s; paused time advances through it
        let start = Instant::now();
        limiter.acquire(None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(59));
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_fails_fast_past_deadline() {
        let limiter = RateLimiter::new(1);
        limiter.acquire(None).await.unwrap();

        // The wait would be ~60s but the deadline is 1s away
        let deadline = Instant::now() + Duration::from_secs(1);
        let result = limiter.acquire(Some(deadline)).await;
        assert_eq!(result, Err(WaitExceedsDeadline));
        // Failure is immediate, not after sleeping
        assert!(Instant::now() < deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = RateLimiter::new(1);
        limiter.acquire(None).await.unwrap();
        assert_eq!(limiter.in_flight(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(limiter.in_flight(), 0);
        limiter.acquire(None).await.unwrap();
    }
}
