//! Per-account sliding-window admission control to the broker's REST API.
//!
//! One [`RateLimiter`] instance per account — a burst on the leader side
//! must never throttle the follower side and vice versa.

use copytrade_model::Account;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

struct Window {
    admissions: VecDeque<Instant>,
}

/// Token-bucket-by-another-name: admits at most `max_rps` calls in any
/// trailing `window`. `acquire` blocks the caller rather than rejecting
/// — callers that can't tolerate waiting shouldn't share a limiter
/// instance.
pub struct RateLimiter {
    max_rps: usize,
    window: Duration,
    windows: Mutex<HashMap<Account, Window>>,
}

impl RateLimiter {
    /// `max_rps` calls admitted per trailing `window`.
    pub fn new(max_rps: usize, window: Duration) -> Self {
        Self {
            max_rps,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Blocks until a call for `account` is admitted. Returns `true` if
    /// the caller had to wait for the window to clear, so callers can
    /// track rate-limit pressure without the limiter needing to know
    /// about metrics.
    pub async fn acquire(&self, account: Account) -> bool {
        let mut waited = false;
        loop {
            let wait = {
                let mut windows = self.windows.lock();
                let window = windows.entry(account).or_insert_with(|| Window {
                    admissions: VecDeque::new(),
                });
                let now = Instant::now();
                let window_start = now - self.window;
                while window
                    .admissions
                    .front()
                    .is_some_and(|t| *t < window_start)
                {
                    window.admissions.pop_front();
                }

                if window.admissions.len() < self.max_rps {
                    window.admissions.push_back(now);
                    None
                } else {
                    let oldest = *window.admissions.front().unwrap();
                    Some((self.window + Duration::from_millis(1))
                        .saturating_sub(now.duration_since(oldest)))
                }
            };

            match wait {
                None => return waited,
                Some(duration) => {
                    waited = true;
                    tokio::time::sleep(duration).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn admits_burst_up_to_limit_immediately() {
        let limiter = RateLimiter::new(10, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire(Account::Leader).await;
        }
        assert!(Instant::now().duration_since(start) < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn eleventh_call_waits_for_the_window_to_clear() {
        let limiter = RateLimiter::new(10, Duration::from_secs(1));
        for _ in 0..10 {
            let waited = limiter.acquire(Account::Leader).await;
            assert!(!waited);
        }
        let start = Instant::now();
        let waited = limiter.acquire(Account::Leader).await;
        assert!(waited);
        assert!(Instant::now().duration_since(start) >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn accounts_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        limiter.acquire(Account::Leader).await;
        let start = Instant::now();
        limiter.acquire(Account::Follower).await;
        assert!(Instant::now().duration_since(start) < Duration::from_millis(50));
    }
}
