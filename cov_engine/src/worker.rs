//! Background worker for a track
//!
//! The worker takes requests from the queue in FIFO order and for each one
//! decides between three actions:
//!
//!   serve from cache - the published window has the same filter and covers
//!                      the request.  Always done when possible, stale or not
//!   drop as stale    - a newer request has been submitted whose centre is
//!                      more than center_tolerance away, and the cache cannot
//!                      answer.  The request is dropped without a reply
//!   recompute        - query the source over a padded window around the
//!                      request centre, aggregate, publish and reply
//!
//! A failed recomputation is reported to that request only; the previously
//! published window stays in place and the worker carries on.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    aggregate::aggregate,
    base::Pos,
    cache::WindowCache,
    config::TrackConfig,
    error::TrackError,
    queue::{IntervalRequest, Poll, RequestReceiver},
    source::AlignmentSource,
    stats::TrackStats,
    track::TrackId,
    window::CoverageWindow,
};

/// State shared between a track handle and its worker
#[derive(Debug, Default)]
pub(crate) struct TrackShared {
    pub(crate) cache: WindowCache,
    pub(crate) stats: TrackStats,
    pub(crate) stop: AtomicBool,
}

impl TrackShared {
    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// What happened to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    CacheHit,
    StaleCached,
    StaleDropped,
    Recomputed,
    Failed,
    /// Track closed before the reply was sent
    Abandoned,
}

pub struct CoverageWorker<S> {
    track: TrackId,
    ref_id: Arc<str>,
    ref_len: Pos,
    source: S,
    queue: RequestReceiver,
    shared: Arc<TrackShared>,
    cfg: TrackConfig,
}

impl<S: AlignmentSource> CoverageWorker<S> {
    pub(crate) fn new(
        track: TrackId,
        ref_id: Arc<str>,
        ref_len: Pos,
        source: S,
        queue: RequestReceiver,
        shared: Arc<TrackShared>,
        cfg: TrackConfig,
    ) -> Self {
        Self {
            track,
            ref_id,
            ref_len,
            source,
            queue,
            shared,
            cfg,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Main loop.  Runs until stop is requested or the producer end of the
    /// queue goes away.  Requests still queued at that point are dropped
    pub fn run(mut self) {
        debug!("Coverage worker for track {} starting up", self.track);
        let wait = self.cfg.idle_wait();
        while !self.shared.stop_requested() {
            match self.queue.dequeue_timeout(wait) {
                Poll::Ready(r) => {
                    if self.shared.stop_requested() {
                        self.abandon(r);
                        break;
                    }
                    self.handle(r);
                }
                Poll::Empty => (),
                Poll::Disconnected => break,
            }
        }
        let mut n = 0;
        while let Poll::Ready(r) = self.queue.dequeue() {
            self.abandon(r);
            n += 1
        }
        if n > 0 {
            debug!("Track {}: dropped {} pending requests", self.track, n)
        }
        debug!(
            "Coverage worker for track {} closing down ({})",
            self.track,
            self.shared.stats.snapshot()
        );
    }

    /// Handle the next request if one is waiting.  Does not block
    pub fn step(&mut self) -> Option<Outcome> {
        match self.queue.dequeue() {
            Poll::Ready(r) => Some(self.handle(r)),
            _ => None,
        }
    }

    fn abandon(&self, r: IntervalRequest) {
        trace!("Track {}: abandoning {:?}", self.track, r);
        self.shared.stats.add_abandoned();
    }

    /// A request is stale if it is not the latest one submitted and its
    /// centre has moved on by more than the tolerance
    fn is_stale(&self, r: &IntervalRequest) -> bool {
        match self.queue.latest() {
            Some(l) => {
                l.serial != r.serial()
                    && r.center().abs_diff(l.center) > self.cfg.center_tolerance()
            }
            None => false,
        }
    }

    pub(crate) fn handle(&mut self, r: IntervalRequest) -> Outcome {
        let stale = self.is_stale(&r);
        let cached = self
            .shared
            .cache
            .snapshot()
            .filter(|w| w.serves(r.filter(), r.from(), r.to()));

        match (cached, stale) {
            (Some(w), false) => {
                self.shared.stats.add_cache_hit();
                trace!("Track {}: {:?} served from cache", self.track, r);
                r.reply(Ok(w));
                Outcome::CacheHit
            }
            (Some(w), true) => {
                self.shared.stats.add_stale_cached();
                trace!("Track {}: stale {:?} served from cache", self.track, r);
                r.reply(Ok(w));
                Outcome::StaleCached
            }
            (None, true) => {
                self.shared.stats.add_stale_dropped();
                trace!("Track {}: dropping stale {:?}", self.track, r);
                Outcome::StaleDropped
            }
            (None, false) => match self.recompute(&r) {
                Ok(w) => {
                    self.shared.cache.publish(Arc::clone(&w));
                    if self.shared.stop_requested() {
                        self.abandon(r);
                        Outcome::Abandoned
                    } else {
                        self.shared.stats.add_recomputed();
                        r.reply(Ok(w));
                        Outcome::Recomputed
                    }
                }
                Err(e) => {
                    match &e {
                        TrackError::Invariant { .. } => error!("Track {}: {}", self.track, e),
                        _ => warn!("Track {}: {}", self.track, e),
                    }
                    self.shared.stats.add_failed();
                    r.reply(Err(e));
                    Outcome::Failed
                }
            },
        }
    }

    /// Window computed for a request: PAD either side of the centre, clipped
    /// to the reference, and never smaller than the request itself
    pub(crate) fn padded_bounds(&self, r: &IntervalRequest) -> (Pos, Pos) {
        let c = r.center();
        let pad = self.cfg.pad();
        let from = c.saturating_sub(pad).max(1).min(r.from());
        let to = c.saturating_add(pad).min(self.ref_len).max(r.to());
        (from, to)
    }

    fn recompute(&mut self, r: &IntervalRequest) -> Result<Arc<CoverageWindow>, TrackError> {
        let (from, to) = self.padded_bounds(r);
        debug!(
            "Track {}: computing coverage for {}:{}-{} (request {}-{}, {})",
            self.track,
            self.ref_id,
            from,
            to,
            r.from(),
            r.to(),
            r.filter()
        );
        self.shared.stats.add_query();
        let records = self
            .source
            .query_overlapping(&self.ref_id, from, to)
            .map_err(|cause| TrackError::Query {
                ref_id: self.ref_id.to_string(),
                from,
                to,
                cause,
            })?;
        let (w, st) = aggregate(
            records,
            Arc::clone(&self.ref_id),
            from,
            to,
            *r.filter(),
            self.cfg.weight_mode(),
        )?;
        self.shared.stats.add_records_skipped(st.skipped);
        Ok(Arc::new(w))
    }
}
