//! Common helpers for worker counts and timeouts

use std::thread::available_parallelism;
use std::time::Duration;

pub fn cpu_parallel_batches() -> usize {
    available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Resolve a requested worker count: `Some(0)` means one worker per CPU
pub fn resolve_workers(requested: Option<usize>) -> Option<usize> {
    match requested {
        Some(0) => Some(cpu_parallel_batches()),
        other => other,
    }
}

/// Convert a timeout in seconds to a `Duration`; zero, negative or non-finite
/// values disable the timeout
pub fn timeout_from_secs(secs: Option<f64>) -> Option<Duration> {
    secs.filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_workers() {
        assert_eq!(resolve_workers(None), None);
        assert_eq!(resolve_workers(Some(6)), Some(6));
        assert!(resolve_workers(Some(0)).unwrap() >= 1);
    }

    #[test]
    fn test_timeout_from_secs() {
        assert_eq!(timeout_from_secs(None), None);
        assert_eq!(timeout_from_secs(Some(0.0)), None);
        assert_eq!(timeout_from_secs(Some(-1.0)), None);
        assert_eq!(timeout_from_secs(Some(f64::NAN)), None);
        assert_eq!(timeout_from_secs(Some(1.5)), Some(Duration::from_millis(1500)));
    }
}
