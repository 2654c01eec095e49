#[macro_use]
extern crate anyhow;

use std::{fmt, io::BufRead, str::FromStr, sync::OnceLock};

use anyhow::Context;
use clap::ArgMatches;
use regex::Regex;

/// LogLevel
///
/// Minimum level of messages that will be logged.  `None` silences
/// all output
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    None,
}

impl FromStr for LogLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            "none" => Ok(Self::None),
            _ => Err("no match"),
        }
    }
}

impl LogLevel {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Verbosity as understood by stderrlog (0 = errors only)
    pub fn verbosity(&self) -> usize {
        match self {
            Self::Error | Self::None => 0,
            Self::Warn => 1,
            Self::Info => 2,
            Self::Debug => 3,
            Self::Trace => 4,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Initialize logging from command line arguments.  Expects the options
/// `loglevel`, `quiet` and `timestamp` to be defined in the command model
pub fn init_log(m: &ArgMatches) -> anyhow::Result<()> {
    let level = m
        .get_one::<LogLevel>("loglevel")
        .copied()
        .unwrap_or(LogLevel::Info);
    let quiet = level.is_none() || m.get_flag("quiet");
    let ts = m
        .get_one::<stderrlog::Timestamp>("timestamp")
        .copied()
        .unwrap_or(stderrlog::Timestamp::Off);

    stderrlog::new()
        .quiet(quiet)
        .verbosity(level.verbosity())
        .timestamp(ts)
        .init()
        .with_context(|| "Could not initialize logging")
}

/// Read in next line and split on tabs after trimming white space
pub fn get_next_line<'a, R: BufRead>(
    rdr: &mut R,
    buf: &'a mut String,
) -> anyhow::Result<Option<Vec<&'a str>>> {
    buf.clear();
    if rdr.read_line(buf)? == 0 {
        Ok(None)
    } else {
        Ok(Some(buf.trim().split('\t').collect()))
    }
}

/// Parse a genomic coordinate, allowing commas as thousands separators
pub fn parse_pos_with_commas(s: &str) -> anyhow::Result<u32> {
    s.trim()
        .replace(',', "")
        .parse::<u32>()
        .with_context(|| format!("Error parsing coordinate {}", s))
}

/// A region as given on the command line or in a region list.
/// Coordinates are 1-based and inclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub ctg: Option<String>,
    pub from: u32,
    pub to: u32,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ctg {
            Some(c) => write!(f, "{}:{}-{}", c, self.from, self.to),
            None => write!(f, "{}-{}", self.from, self.to),
        }
    }
}

fn region_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:([^:\s]+):)?([0-9,]+)\s*[-:]\s*([0-9,]+)\s*$")
            .expect("Invalid region regex")
    })
}

/// Parse a region of the form `ctg:from-to` or `from-to`.  A single
/// position `ctg:x` is not accepted; from must be at least 1 and not
/// greater than to
pub fn parse_region(s: &str) -> anyhow::Result<Region> {
    let c = region_regex()
        .captures(s)
        .ok_or_else(|| anyhow!("Illegal region: {}", s))?;
    let ctg = c.get(1).map(|m| m.as_str().to_owned());
    let from = parse_pos_with_commas(&c[2])?;
    let to = parse_pos_with_commas(&c[3])?;
    if from == 0 {
        Err(anyhow!("Region {}: coordinates are 1-based", s))
    } else if to < from {
        Err(anyhow!("Range error - {} > {}", from, to))
    } else {
        Ok(Region { ctg, from, to })
    }
}
