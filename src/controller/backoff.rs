//! # Fibonacci Backoff
//!
//! Progressive backoff for transient reconciliation failures.
//! Grows more slowly than exponential backoff, so a workload whose source repository
//! is briefly unreachable is retried promptly without hammering the Git server.
//!
//! The sequence is calculated in minutes and returned in seconds.
//! Sequence: 1m, 1m, 2m, 3m, 5m, 8m, 10m (max).
//!
//! ## Usage
//!
//! ```rust
//! use env_inject_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10); // 1 minute min, 10 minutes max
//! assert_eq!(backoff.next_backoff_seconds(), 60);  // 1m = 60s
//! assert_eq!(backoff.next_backoff_seconds(), 60);  // 1m = 60s
//! assert_eq!(backoff.next_backoff_seconds(), 120); // 2m = 120s
//! assert_eq!(backoff.next_backoff_seconds(), 180); // 3m = 180s
//! assert_eq!(backoff.next_backoff_seconds(), 300); // 5m = 300s
//! ```

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in minutes (for reset)
    min_minutes: u64,
    /// Previous backoff value in minutes
    prev_minutes: u64,
    /// Current backoff value in minutes
    current_minutes: u64,
    /// Maximum backoff value in minutes
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with minimum and maximum values in minutes
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result_seconds = self.current_minutes * 60;

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = std::cmp::min(next_minutes, self.max_minutes);

        result_seconds
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}
