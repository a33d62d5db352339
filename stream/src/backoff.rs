//! Exponential reconnect backoff, capped, with a bounded attempt count.
//! Delay and attempt counter both reset on every clean message, mirroring
//! the reconnect/attempt-cap state a connection FSM tracks across
//! disconnects.

use std::time::Duration;

pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
    max_attempts: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            min,
            max,
            current: min,
            attempts: 0,
            max_attempts,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.min;
        self.attempts = 0;
    }

    /// Returns the delay to wait before the next reconnect attempt, then
    /// doubles it (capped at `max`) for the attempt after that.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Records a failed connection attempt. Returns `true` once the
    /// count since the last `reset` exceeds `max_attempts`, meaning the
    /// caller should stop retrying and escalate instead of sleeping again.
    pub fn record_attempt(&mut self) -> bool {
        self.attempts += 1;
        self.attempts > self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_up_to_the_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 10);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn caps_at_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5), 10);
        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn reset_returns_to_min() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 10);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn record_attempt_trips_once_max_attempts_exceeded() {
        let mut backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(5), 3);
        assert!(!backoff.record_attempt());
        assert!(!backoff.record_attempt());
        assert!(!backoff.record_attempt());
        assert!(backoff.record_attempt());
    }

    #[test]
    fn reset_clears_the_attempt_count() {
        let mut backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(5), 2);
        backoff.record_attempt();
        backoff.record_attempt();
        backoff.reset();
        assert!(!backoff.record_attempt());
    }
}
