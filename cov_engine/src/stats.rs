use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Counters for a track, updated by the handle (submissions) and the worker
/// (everything else).  Read at any time through snapshot()
#[derive(Debug, Default)]
pub struct TrackStats {
    submitted: AtomicUsize,
    cache_hits: AtomicUsize,
    stale_cached: AtomicUsize,
    stale_dropped: AtomicUsize,
    recomputed: AtomicUsize,
    failed: AtomicUsize,
    abandoned: AtomicUsize,
    queries: AtomicUsize,
    records_skipped: AtomicUsize,
}

#[inline]
fn incr(x: &AtomicUsize, n: usize) {
    x.fetch_add(n, Ordering::Relaxed);
}

impl TrackStats {
    pub(crate) fn add_submitted(&self) {
        incr(&self.submitted, 1)
    }

    pub(crate) fn add_cache_hit(&self) {
        incr(&self.cache_hits, 1)
    }

    pub(crate) fn add_stale_cached(&self) {
        incr(&self.stale_cached, 1)
    }

    pub(crate) fn add_stale_dropped(&self) {
        incr(&self.stale_dropped, 1)
    }

    pub(crate) fn add_recomputed(&self) {
        incr(&self.recomputed, 1)
    }

    pub(crate) fn add_failed(&self) {
        incr(&self.failed, 1)
    }

    pub(crate) fn add_abandoned(&self) {
        incr(&self.abandoned, 1)
    }

    pub(crate) fn add_query(&self) {
        incr(&self.queries, 1)
    }

    pub(crate) fn add_records_skipped(&self, n: usize) {
        incr(&self.records_skipped, n)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let ld = |x: &AtomicUsize| x.load(Ordering::Relaxed);
        StatsSnapshot {
            submitted: ld(&self.submitted),
            cache_hits: ld(&self.cache_hits),
            stale_cached: ld(&self.stale_cached),
            stale_dropped: ld(&self.stale_dropped),
            recomputed: ld(&self.recomputed),
            failed: ld(&self.failed),
            abandoned: ld(&self.abandoned),
            queries: ld(&self.queries),
            records_skipped: ld(&self.records_skipped),
        }
    }
}

/// Point in time copy of TrackStats
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: usize,
    pub cache_hits: usize,
    pub stale_cached: usize,
    pub stale_dropped: usize,
    pub recomputed: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub queries: usize,
    pub records_skipped: usize,
}

impl StatsSnapshot {
    /// Requests that have had (or will never have) an answer
    pub fn handled(&self) -> usize {
        self.cache_hits
            + self.stale_cached
            + self.stale_dropped
            + self.recomputed
            + self.failed
            + self.abandoned
    }

    /// Requests that received a reply
    pub fn answered(&self) -> usize {
        self.cache_hits + self.stale_cached + self.recomputed + self.failed
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted: {}, cache hits: {}, stale (cached): {}, stale (dropped): {}, recomputed: {}, failed: {}, abandoned: {}, source queries: {}, records skipped: {}",
            self.submitted,
            self.cache_hits,
            self.stale_cached,
            self.stale_dropped,
            self.recomputed,
            self.failed,
            self.abandoned,
            self.queries,
            self.records_skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts() {
        let st = TrackStats::default();
        st.add_submitted();
        st.add_submitted();
        st.add_submitted();
        st.add_cache_hit();
        st.add_stale_dropped();
        st.add_recomputed();
        st.add_records_skipped(4);
        let s = st.snapshot();
        assert_eq!(s.handled(), 3);
        assert_eq!(s.answered(), 2);
        assert_eq!(s.records_skipped, 4);
        assert!(s.to_string().starts_with("submitted: 3, cache hits: 1"));
    }
}
