//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Threaded component lifecycle for the R-Swarm runtime."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Consecutive faults tolerated before a component is shut down.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 10;

/// Consecutive-fault counter guarding one component.
///
/// The budget is exhausted once the count exceeds the threshold. Successful
/// handler or periodic runs reset the streak; hooks do not.
#[derive(Debug)]
pub struct ErrorBudget {
    threshold: u32,
    consecutive: AtomicU32,
    total: AtomicU64,
    tripped: AtomicBool,
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_THRESHOLD)
    }
}

impl ErrorBudget {
    /// Budget with a custom threshold.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: AtomicU32::new(0),
            total: AtomicU64::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    /// Configured threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Count a fault and return the current streak.
    pub fn record_fault(&self) -> u32 {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.consecutive.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Reset the streak after a successful run.
    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
    }

    /// Current streak.
    pub fn consecutive(&self) -> u32 {
        self.consecutive.load(Ordering::Relaxed)
    }

    /// Faults counted since creation.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Whether the streak is past the threshold.
    pub fn is_exhausted(&self) -> bool {
        self.consecutive() > self.threshold
    }

    /// Mark the budget as acted upon. Returns `true` only for the first call.
    pub fn trip(&self) -> bool {
        !self.tripped.swap(true, Ordering::AcqRel)
    }

    /// Whether a forced shutdown has already happened.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_after_threshold_is_exceeded() {
        let budget = ErrorBudget::default();
        for _ in 0..DEFAULT_ERROR_THRESHOLD {
            budget.record_fault();
        }
        assert!(!budget.is_exhausted());
        assert_eq!(budget.record_fault(), DEFAULT_ERROR_THRESHOLD + 1);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn success_resets_the_streak_but_not_the_total() {
        let budget = ErrorBudget::new(2);
        budget.record_fault();
        budget.record_fault();
        budget.record_success();
        budget.record_fault();
        assert_eq!(budget.consecutive(), 1);
        assert_eq!(budget.total(), 3);
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn trips_once() {
        let budget = ErrorBudget::new(0);
        assert!(budget.trip());
        assert!(!budget.trip());
        assert!(budget.is_tripped());
    }
}
