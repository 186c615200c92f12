//! Reentrancy guard for periodic jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Admits at most one in-flight tick.
///
/// Acquisition is a single compare-and-swap; a caller that loses the race gets
/// `None` and is expected to drop its tick rather than wait.
#[derive(Debug, Default)]
pub struct TickGuard {
    in_flight: AtomicBool,
}

impl TickGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<TickPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickPermit {
                guard: Arc::clone(self),
            })
    }

    pub fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Proof of an acquired [`TickGuard`]; releases it on drop, including when the
/// tick panics.
#[derive(Debug)]
pub struct TickPermit {
    guard: Arc<TickGuard>,
}

impl Drop for TickPermit {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let guard = Arc::new(TickGuard::new());

        let permit = guard.try_acquire().expect("first acquire succeeds");
        assert!(guard.is_held());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_held());
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_permit_released_when_task_panics() {
        let guard = Arc::new(TickGuard::new());
        let permit = guard.try_acquire().unwrap();

        let result = tokio::spawn(async move {
            let _permit = permit;
            panic!("tick failed");
        })
        .await;

        assert!(result.is_err());
        assert!(!guard.is_held());
    }
}
