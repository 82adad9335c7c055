//! Iteration and wall-clock limits for one invocation.

use std::time::{Duration, Instant};

/// Budget owned by a single invocation.
///
/// Checked between passes only; a pass that has started always finishes.
#[derive(Debug, Clone)]
pub struct Budget {
    max_iterations: Option<usize>,
    max_execution_time: Option<Duration>,
    iterations: usize,
    elapsed: Duration,
    started: Instant,
}

impl Budget {
    pub fn new(max_iterations: Option<usize>, max_execution_time: Option<Duration>) -> Self {
        Self::starting_at(Instant::now(), max_iterations, max_execution_time)
    }

    /// A budget whose clock began at `started`, e.g. when the invocation
    /// was accepted rather than when its first pass starts.
    pub fn starting_at(started: Instant, max_iterations: Option<usize>, max_execution_time: Option<Duration>) -> Self {
        Self {
            max_iterations,
            max_execution_time,
            iterations: 0,
            elapsed: Duration::ZERO,
            started,
        }
    }

    /// Whether another pass may start.
    pub fn should_continue(&self) -> bool {
        if let Some(max) = self.max_iterations {
            if self.iterations >= max {
                return false;
            }
        }
        if let Some(limit) = self.max_execution_time {
            if self.elapsed >= limit {
                return false;
            }
        }
        true
    }

    /// Record a completed pass.
    pub fn record_pass(&mut self) {
        self.iterations += 1;
        self.elapsed = self.started.elapsed();
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Elapsed time as of the last completed pass.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_limit() {
        let mut budget = Budget::new(Some(2), None);
        assert!(budget.should_continue());
        budget.record_pass();
        assert_eq!(budget.iterations(), 1);
        assert!(budget.should_continue());
        budget.record_pass();
        assert_eq!(budget.iterations(), 2);
        assert!(!budget.should_continue());
    }

    #[test]
    fn test_unbounded() {
        let mut budget = Budget::new(None, None);
        for _ in 0..100 {
            budget.record_pass();
        }
        assert!(budget.should_continue());
    }

    #[test]
    fn test_time_limit_checked_after_pass() {
        let mut budget = Budget::new(None, Some(Duration::from_millis(1)));
        assert!(budget.should_continue());
        std::thread::sleep(Duration::from_millis(5));
        // Elapsed time is only measured when a pass completes.
        assert!(budget.should_continue());
        budget.record_pass();
        assert!(!budget.should_continue());
    }

    #[test]
    fn test_clock_counts_from_start_instant() {
        let started = Instant::now();
        std::thread::sleep(Duration::from_millis(20));
        let mut budget = Budget::starting_at(started, None, Some(Duration::from_millis(15)));
        assert!(budget.should_continue());
        budget.record_pass();
        assert!(budget.elapsed() >= Duration::from_millis(20));
        assert!(!budget.should_continue());
    }

    #[test]
    fn test_zero_time_limit_allows_nothing() {
        assert!(!Budget::new(None, Some(Duration::ZERO)).should_continue());
    }

    #[test]
    fn test_zero_iterations_allows_nothing() {
        assert!(!Budget::new(Some(0), None).should_continue());
    }
}
