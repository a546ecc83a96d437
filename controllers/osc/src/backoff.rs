//! # Fibonacci Backoff
//!
//! Retry delays for keys whose reconciliation failed. Delays grow along the
//! Fibonacci sequence, which is slower than exponential backoff and keeps a
//! broken MachineDeployment from being retried in a tight loop without
//! leaving it parked for long once the cause is fixed.
//!
//! Sequence with a 1s step and a 5m cap: 1s, 1s, 2s, 3s, 5s, 8s, ... 300s.

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// First delay (used for reset)
    min: Duration,
    /// Previous delay
    prev: Duration,
    /// Current delay
    current: Duration,
    /// Upper bound
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff starting at `min` and capped at `max`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;

        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);

        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}

impl Default for FibonacciBackoff {
    /// 1s step, 5 minute cap
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(backoff: &mut FibonacciBackoff) -> u64 {
        backoff.next_backoff().as_secs()
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(Duration::from_secs(1), Duration::from_secs(10));

        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 2);
        assert_eq!(secs(&mut backoff), 3);
        assert_eq!(secs(&mut backoff), 5);
        assert_eq!(secs(&mut backoff), 8);
        assert_eq!(secs(&mut backoff), 10); // max
        // Next would be 18s (8+10) but stays capped
        assert_eq!(secs(&mut backoff), 10);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::default();

        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 2);

        backoff.reset();

        // Should restart from beginning after success
        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 1);
    }

    #[test]
    fn test_sub_second_steps() {
        let mut backoff = FibonacciBackoff::new(Duration::from_millis(5), Duration::from_millis(20));
        let delays: Vec<u128> = (0..6).map(|_| backoff.next_backoff().as_millis()).collect();
        assert_eq!(delays, vec![5, 5, 10, 15, 20, 20]);
    }
}
