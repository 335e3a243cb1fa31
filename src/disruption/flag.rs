//! The process-wide "optimizing" flag.

use tokio::sync::watch;

/// Counts recommendation requests in flight; optimizing while non-zero.
///
/// Backed by a watch channel so the API can push changes to clients.
#[derive(Debug)]
pub struct OptimizingFlag {
    in_flight: watch::Sender<usize>,
}

impl Default for OptimizingFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizingFlag {
    pub fn new() -> Self {
        let (in_flight, _rx) = watch::channel(0);
        Self { in_flight }
    }

    pub fn is_optimizing(&self) -> bool {
        *self.in_flight.borrow() > 0
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Watch the in-flight count.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }

    pub(crate) fn acquire(&self) {
        self.in_flight.send_modify(|n| *n += 1);
    }

    pub(crate) fn release(&self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}
