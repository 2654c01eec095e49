use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use cov_engine::{ReadClassFilter, TrackConfig};
use utils::Region;

/// Config
///
/// inputs - alignment files, one track each
/// reference - reference sequence all tracks are opened on
/// regions - viewport regions replayed against every track
/// wait - how long to wait for outstanding answers
///
pub struct Config {
    inputs: Vec<PathBuf>,
    reference: String,
    regions: Vec<Region>,
    output_file: Option<PathBuf>,
    track_cfg: TrackConfig,
    filter: ReadClassFilter,
    wait: Duration,
}

impl Config {
    pub fn new(
        inputs: Vec<PathBuf>,
        reference: String,
        regions: Vec<Region>,
        output_file: Option<PathBuf>,
        track_cfg: TrackConfig,
        filter: ReadClassFilter,
        wait: Duration,
    ) -> Self {
        Self {
            inputs,
            reference,
            regions,
            output_file,
            track_cfg,
            filter,
            wait,
        }
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    pub fn track_cfg(&self) -> &TrackConfig {
        &self.track_cfg
    }

    pub fn filter(&self) -> &ReadClassFilter {
        &self.filter
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }
}
