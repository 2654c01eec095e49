use std::{fmt, str::FromStr, time::Duration};

use crate::{base::Pos, record::AlignmentRecord};

/// How much a single alignment record contributes to coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightMode {
    /// Every record counts once
    #[default]
    PerRecord,
    /// Records stand for collapsed duplicate groups and count their multiplicity
    Multiplicity,
}

impl WeightMode {
    #[inline]
    pub fn weight(self, rec: &AlignmentRecord) -> u32 {
        match self {
            Self::PerRecord => 1,
            Self::Multiplicity => rec.multiplicity,
        }
    }
}

impl FromStr for WeightMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per-record" | "record" | "1" => Ok(Self::PerRecord),
            "multiplicity" | "mult" => Ok(Self::Multiplicity),
            _ => Err("no match"),
        }
    }
}

impl fmt::Display for WeightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PerRecord => "per-record",
            Self::Multiplicity => "multiplicity",
        })
    }
}

pub const DEFAULT_PAD: Pos = 25_000;
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(20);
pub const DEFAULT_CENTER_TOLERANCE: Pos = 1;

/// TrackConfig
///
/// Settings for a coverage track.  Copied into the worker when the
/// track is opened, so later changes do not affect running tracks.
///
/// pad - half width of the window computed around a request centre
/// idle_wait - maximum time the worker blocks waiting for a request before
///             checking for shutdown
/// center_tolerance - a request not the latest is still computed if its centre
///                    is within this distance of the latest request centre
/// weight_mode - contribution of each record
///
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pad: Pos,
    idle_wait: Duration,
    center_tolerance: Pos,
    weight_mode: WeightMode,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackConfig {
    pub fn new() -> Self {
        Self {
            pad: DEFAULT_PAD,
            idle_wait: DEFAULT_IDLE_WAIT,
            center_tolerance: DEFAULT_CENTER_TOLERANCE,
            weight_mode: WeightMode::default(),
        }
    }

    pub fn set_pad(&mut self, pad: Pos) {
        self.pad = pad
    }

    pub fn set_idle_wait(&mut self, d: Duration) -> anyhow::Result<()> {
        if d.is_zero() {
            Err(anyhow!("Idle wait must be greater than zero"))
        } else {
            self.idle_wait = d;
            Ok(())
        }
    }

    /// With the default of 1 a superseded request whose centre is one unit
    /// from the latest is still computed.  For requests centred at 1000,
    /// 1001 and 1002 submitted together, 1000 is dropped, 1001 triggers the
    /// one recompute and 1002 is then answered from that window.  Set 0 to
    /// compute only the latest request (1000 and 1001 are both dropped)
    pub fn set_center_tolerance(&mut self, x: Pos) {
        self.center_tolerance = x
    }

    pub fn set_weight_mode(&mut self, m: WeightMode) {
        self.weight_mode = m
    }

    pub fn pad(&self) -> Pos {
        self.pad
    }

    pub fn idle_wait(&self) -> Duration {
        self.idle_wait
    }

    pub fn center_tolerance(&self) -> Pos {
        self.center_tolerance
    }

    pub fn weight_mode(&self) -> WeightMode {
        self.weight_mode
    }
}
