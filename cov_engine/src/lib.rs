//! Coverage engine for genome browser tracks
//!
//! Each open track has a background worker that answers viewport requests
//! for per-position coverage.  Requests that arrive faster than they can be
//! computed are coalesced: answers come from the cached window where
//! possible, requests overtaken by newer ones are dropped, and otherwise
//! coverage is recomputed over a padded window around the request and
//! published to the cache.
#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod aggregate;
pub mod base;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod queue;
pub mod record;
pub mod source;
pub mod stats;
pub mod track;
pub mod tsv;
pub mod window;
pub mod worker;

pub use aggregate::{aggregate, AggregateStats, CoverageAggregator};
pub use base::{Base, Classification, Pos, Strand};
pub use config::{TrackConfig, WeightMode};
pub use error::TrackError;
pub use filter::ReadClassFilter;
pub use queue::{IntervalRequest, Reply};
pub use record::{AlignmentRecord, Insertion, Mismatch};
pub use source::{AlignmentSource, MemorySource, RecordIter};
pub use stats::StatsSnapshot;
pub use track::{open_file_track, open_track, TrackHandle, TrackId, TrackSet};
pub use tsv::read_alignment_file;
pub use window::{CoverageWindow, InsertionCounts, PositionCounts};
