use thiserror::Error;

use crate::{base::Pos, track::TrackId};

/// Errors reported by tracks, either when opening/submitting or through
/// a request's reply
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Alignment source {name} unavailable for track {track}: {cause:#}")]
    SourceUnavailable {
        track: TrackId,
        name: String,
        cause: anyhow::Error,
    },

    #[error("Reference {ref_id} not found in alignment source {name}")]
    UnknownReference { ref_id: String, name: String },

    #[error("Invalid interval {from}-{to} (reference length {ref_len})")]
    InvalidInterval { from: Pos, to: Pos, ref_len: Pos },

    #[error("Failed to fetch alignments for {ref_id}:{from}-{to}: {cause:#}")]
    Query {
        ref_id: String,
        from: Pos,
        to: Pos,
        cause: anyhow::Error,
    },

    #[error("Coverage invariant violated at {ref_id}:{pos}: {message}")]
    Invariant {
        ref_id: String,
        pos: Pos,
        message: String,
    },

    #[error("Could not start worker thread for track {track}")]
    Spawn {
        track: TrackId,
        #[source]
        source: std::io::Error,
    },

    #[error("Track {0} is closed")]
    TrackClosed(TrackId),

    #[error("Track {0} is already open")]
    DuplicateTrack(TrackId),

    #[error("Track {0} not found")]
    UnknownTrack(TrackId),
}
