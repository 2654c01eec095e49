use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use arc_swap::ArcSwapOption;

use crate::window::CoverageWindow;

/// WindowCache
///
/// Holds the one published window for a track.  Windows are fully built
/// before being published, and publishing only swaps the pointer, so a
/// reader either sees the previous window or the new one.  Neither side
/// takes a lock: a snapshot never waits for a publish in progress, and
/// a reader holding an old window does not hold up the next publish.
///
/// generation - number of windows published so far
///
#[derive(Debug, Default)]
pub struct WindowCache {
    current: ArcSwapOption<CoverageWindow>,
    generation: AtomicU64,
}

impl WindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently published window, if any
    pub fn snapshot(&self) -> Option<Arc<CoverageWindow>> {
        self.current.load_full()
    }

    /// Replace the published window, returning the previous one
    pub fn publish(&self, w: Arc<CoverageWindow>) -> Option<Arc<CoverageWindow>> {
        let prev = self.current.swap(Some(w));
        self.generation.fetch_add(1, Ordering::Release);
        prev
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
