//! `WorkCoordinator` (spec §4.G): the shared stop flag a search's worker
//! threads poll at the top of their tick loop. Each worker free-runs its
//! own batch of self-play games independently -- there is no round-based
//! dispatch of discrete work items for a controller to hand out, so the
//! only thing workers actually need from a shared controller is a way to
//! be told, promptly, that the search is over.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct WorkCoordinator {
    should_shut_down: AtomicBool,
}

impl WorkCoordinator {
    pub fn new() -> Self {
        Self { should_shut_down: AtomicBool::new(false) }
    }

    pub fn should_shut_down(&self) -> bool {
        self.should_shut_down.load(Ordering::Acquire)
    }

    /// Flips the stop flag so every worker observes it at its next tick.
    pub fn request_shutdown(&self) {
        self.should_shut_down.store(true, Ordering::Release);
    }
}

impl Default for WorkCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let coordinator = WorkCoordinator::new();
        assert!(!coordinator.should_shut_down());
    }

    #[test]
    fn request_shutdown_is_observed() {
        let coordinator = WorkCoordinator::new();
        coordinator.request_shutdown();
        assert!(coordinator.should_shut_down());
    }
}
