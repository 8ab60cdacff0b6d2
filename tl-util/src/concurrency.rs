//! Cooperative cancellation primitives
//!
//! Cycle enumeration is CPU-bound and never awaits, so it cannot be cancelled
//! by dropping a future. Instead every inner loop samples a shared atomic
//! flag at its natural check frequency, per the discovery orchestrator's
//! cancellation design.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A boolean flag shared between a discovery request and the worker jobs it
/// spawns. Cloning is cheap; all clones observe the same underlying flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationCell {
    flag: Arc<AtomicBool>,
}

impl CancellationCell {
    /// Create a new, not-yet-cancelled cell
    pub fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)) }
    }

    /// Mark this cell (and all its clones) as cancelled
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::CancellationCell;

    #[test]
    fn clones_share_state() {
        let cell = CancellationCell::new();
        let clone = cell.clone();

        assert!(!cell.is_cancelled());
        clone.cancel();
        assert!(cell.is_cancelled());
    }
}
