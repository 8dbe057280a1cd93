//! Simulator run counter and stop switch shared between worker threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// How many simulator runs have finished out of how many are planned.
///
/// `Sweep::run` and `run_average_with_progress` bump the counter after each
/// successful simulator run, from whichever thread ran it. A clone kept by
/// the caller sees the same counts, and setting its stop switch makes the
/// remaining runs fail with `Cancelled`.
#[derive(Debug, Clone)]
pub struct RunProgress {
    runs_done: Arc<AtomicUsize>,
    runs_planned: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
}

impl RunProgress {
    #[must_use]
    pub fn new(runs_planned: usize) -> Self {
        Self {
            runs_done: Arc::new(AtomicUsize::new(0)),
            runs_planned: Arc::new(AtomicUsize::new(runs_planned)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulator runs that have finished successfully
    #[must_use]
    pub fn completed(&self) -> usize {
        self.runs_done.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.runs_planned.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.runs_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Start counting a new batch of `runs_planned` runs. The stop switch is
    /// left as it is.
    pub fn reset(&self, runs_planned: usize) {
        self.runs_done.store(0, Ordering::Relaxed);
        self.runs_planned.store(runs_planned, Ordering::Relaxed);
    }

    /// Stop before the next simulator run starts. A `ProcessRunner` holding
    /// `cancel_flag()` also kills the simulator it is waiting on.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// The stop switch itself, for `ProcessRunner::with_cancel_flag`
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let progress = RunProgress::new(3);
        let handle = progress.clone();
        handle.increment();
        handle.increment();
        assert_eq!(progress.completed(), 2);

        progress.reset(10);
        assert_eq!(handle.completed(), 0);
        assert_eq!(handle.total(), 10);

        assert!(!handle.is_cancelled());
        let flag = handle.cancel_flag();
        progress.cancel();
        assert!(handle.is_cancelled());
        assert!(flag.load(Ordering::Relaxed));
    }
}
