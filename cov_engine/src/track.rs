use std::{
    collections::BTreeMap,
    fmt,
    path::Path,
    sync::{atomic::Ordering, Arc},
    thread::{self, JoinHandle},
};

use crossbeam_channel::Receiver;

use crate::{
    base::Pos,
    config::TrackConfig,
    error::TrackError,
    filter::ReadClassFilter,
    queue::{request_queue, IntervalRequest, Reply, RequestSender},
    source::AlignmentSource,
    stats::StatsSnapshot,
    tsv::read_alignment_file,
    window::CoverageWindow,
    worker::{CoverageWorker, TrackShared},
};

/// Caller assigned track identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// TrackHandle
///
/// Owner's end of an open track.  Submitting never blocks.  Closing (or
/// dropping) the handle stops the worker; requests not yet answered are
/// dropped without a reply.
pub struct TrackHandle {
    id: TrackId,
    ref_id: Arc<str>,
    ref_len: Pos,
    queue: Option<RequestSender>,
    shared: Arc<TrackShared>,
    worker: Option<JoinHandle<()>>,
}

/// Start a worker for ref_id on source.  The source is moved into the worker
/// and owned by it until the track is closed
pub fn open_track<S>(
    id: TrackId,
    ref_id: &str,
    source: S,
    cfg: &TrackConfig,
) -> Result<TrackHandle, TrackError>
where
    S: AlignmentSource + 'static,
{
    let ref_len = source
        .reference_length(ref_id)
        .ok_or_else(|| TrackError::UnknownReference {
            ref_id: ref_id.to_owned(),
            name: source.name().to_owned(),
        })?;
    debug!(
        "Opening track {} on {} ({}, length {})",
        id,
        source.name(),
        ref_id,
        ref_len
    );

    let ref_id: Arc<str> = Arc::from(ref_id);
    let (snd, rcv) = request_queue();
    let shared = Arc::new(TrackShared::default());
    let worker = CoverageWorker::new(
        id,
        Arc::clone(&ref_id),
        ref_len,
        source,
        rcv,
        Arc::clone(&shared),
        cfg.clone(),
    );
    let jh = thread::Builder::new()
        .name(format!("cov-track-{}", id))
        .spawn(move || worker.run())
        .map_err(|source| TrackError::Spawn { track: id, source })?;

    Ok(TrackHandle {
        id,
        ref_id,
        ref_len,
        queue: Some(snd),
        shared,
        worker: Some(jh),
    })
}

/// Open a track on an alignment file (see tsv::read_alignment_file)
pub fn open_file_track<P: AsRef<Path>>(
    id: TrackId,
    ref_id: &str,
    path: P,
    cfg: &TrackConfig,
) -> Result<TrackHandle, TrackError> {
    let path = path.as_ref();
    let src = read_alignment_file(path).map_err(|cause| TrackError::SourceUnavailable {
        track: id,
        name: path.display().to_string(),
        cause,
    })?;
    open_track(id, ref_id, src, cfg)
}

impl TrackHandle {
    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
    }

    pub fn ref_len(&self) -> Pos {
        self.ref_len
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_none()
    }

    fn check_interval(&self, from: Pos, to: Pos) -> Result<(), TrackError> {
        if from == 0 || from > to || to > self.ref_len {
            Err(TrackError::InvalidInterval {
                from,
                to,
                ref_len: self.ref_len,
            })
        } else {
            Ok(())
        }
    }

    /// Queue a request.  Rejected requests are returned as errors and their
    /// reply function is not called
    pub fn submit(&self, r: IntervalRequest) -> Result<(), TrackError> {
        let snd = self.queue.as_ref().ok_or(TrackError::TrackClosed(self.id))?;
        self.check_interval(r.from(), r.to())?;
        self.shared.stats.add_submitted();
        snd.enqueue(r).map_err(|_| {
            error!("Worker for track {} has gone away", self.id);
            TrackError::TrackClosed(self.id)
        })?;
        Ok(())
    }

    /// Submit a request for [from, to] and return the channel the reply will
    /// arrive on
    pub fn request(
        &self,
        from: Pos,
        to: Pos,
        filter: ReadClassFilter,
    ) -> Result<Receiver<Reply>, TrackError> {
        let (rq, rx) = IntervalRequest::with_channel(from, to, filter);
        self.submit(rq)?;
        Ok(rx)
    }

    /// Window currently published by the worker
    pub fn snapshot(&self) -> Option<Arc<CoverageWindow>> {
        self.shared.cache.snapshot()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Stop the worker and wait for it to exit.  Safe to call more than once
    pub fn close(&mut self) {
        if let Some(snd) = self.queue.take() {
            debug!("Closing track {}", self.id);
            self.shared.stop.store(true, Ordering::Release);
            drop(snd);
            if let Some(jh) = self.worker.take() {
                if jh.join().is_err() {
                    error!("Worker thread for track {} panicked", self.id)
                }
            }
        }
    }
}

impl Drop for TrackHandle {
    fn drop(&mut self) {
        self.close()
    }
}

impl fmt::Debug for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrackHandle({} on {}, {})",
            self.id,
            self.ref_id,
            if self.is_closed() { "closed" } else { "open" }
        )
    }
}

/// TrackSet
///
/// The open tracks of a view, looked up by id.  Dropping the set closes
/// every track in it
#[derive(Debug, Default)]
pub struct TrackSet {
    tracks: BTreeMap<TrackId, TrackHandle>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open<S>(
        &mut self,
        id: TrackId,
        ref_id: &str,
        source: S,
        cfg: &TrackConfig,
    ) -> Result<&TrackHandle, TrackError>
    where
        S: AlignmentSource + 'static,
    {
        if self.tracks.contains_key(&id) {
            return Err(TrackError::DuplicateTrack(id));
        }
        let h = open_track(id, ref_id, source, cfg)?;
        Ok(self.tracks.entry(id).or_insert(h))
    }

    pub fn open_file<P: AsRef<Path>>(
        &mut self,
        id: TrackId,
        ref_id: &str,
        path: P,
        cfg: &TrackConfig,
    ) -> Result<&TrackHandle, TrackError> {
        if self.tracks.contains_key(&id) {
            return Err(TrackError::DuplicateTrack(id));
        }
        let h = open_file_track(id, ref_id, path, cfg)?;
        Ok(self.tracks.entry(id).or_insert(h))
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackHandle> {
        self.tracks.get(&id)
    }

    pub fn submit(&self, id: TrackId, r: IntervalRequest) -> Result<(), TrackError> {
        self.get(id).ok_or(TrackError::UnknownTrack(id))?.submit(r)
    }

    /// Close a track and remove it from the set
    pub fn close(&mut self, id: TrackId) -> Result<(), TrackError> {
        let mut h = self.tracks.remove(&id).ok_or(TrackError::UnknownTrack(id))?;
        h.close();
        Ok(())
    }

    pub fn ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn close_all(&mut self) {
        for (_, mut h) in std::mem::take(&mut self.tracks) {
            h.close()
        }
    }
}
