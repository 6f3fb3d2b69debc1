use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Shared completion counter for work happening on another thread.
/// Cloning is cheap; all clones observe the same counters.
#[derive(Clone, Default)]
pub struct Progress(Arc<ProgressInner>);

#[derive(Default)]
struct ProgressInner {
    complete: AtomicU64,
    total: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fraction(&self) -> f32 {
        let total = self.0.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }

        self.0.complete.load(Ordering::Relaxed) as f32 / total as f32
    }

    pub fn is_finished(&self) -> bool {
        let total = self.0.total.load(Ordering::Relaxed);
        total != 0 && self.0.complete.load(Ordering::Relaxed) >= total
    }

    pub fn set_total(&self, total: u64) {
        self.0.total.store(total, Ordering::Relaxed);
    }

    pub fn set_complete(&self, complete: u64) {
        self.0.complete.store(complete, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        let total = self.0.total.load(Ordering::Relaxed).max(1);
        self.0.total.store(total, Ordering::Relaxed);
        self.0.complete.store(total, Ordering::Relaxed);
    }
}
