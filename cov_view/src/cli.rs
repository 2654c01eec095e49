use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    ArgMatches, Command,
};
use compress_io::compress::CompressIo;

use cov_engine::{Classification, ReadClassFilter, TrackConfig, WeightMode};
use utils::{get_next_line, init_log, parse_pos_with_commas, parse_region, LogLevel, Region};

use crate::config::Config;

/// Set up definition of command options for clap
fn cli_model() -> Command {
    Command::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .author(crate_authors!())
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("warn")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("pad")
                .short('p')
                .long("pad")
                .value_parser(value_parser!(u32))
                .value_name("INT")
                .default_value("25000")
                .help("Half width of window computed around a request"),
        )
        .arg(
            Arg::new("weight")
                .short('w')
                .long("weight")
                .value_parser(value_parser!(WeightMode))
                .value_name("MODE")
                .ignore_case(true)
                .default_value("per-record")
                .help("Contribution of each alignment record [per-record, multiplicity]"),
        )
        .arg(
            Arg::new("min_mapq")
                .short('m')
                .long("min-mapq")
                .value_parser(value_parser!(u8))
                .value_name("INT")
                .default_value("0")
                .help("Minimum mapping quality"),
        )
        .arg(
            Arg::new("classes")
                .short('c')
                .long("classes")
                .value_parser(value_parser!(Classification))
                .value_delimiter(',')
                .value_name("CLASSES")
                .help("Alignment classes to count [default: perfect,best,other]"),
        )
        .arg(
            Arg::new("center_tolerance")
                .short('T')
                .long("center-tolerance")
                .value_parser(value_parser!(u32))
                .value_name("INT")
                .default_value("1")
                .help("Maximum centre shift for a superseded request to still be computed"),
        )
        .arg(
            Arg::new("reference")
                .short('r')
                .long("reference")
                .value_parser(value_parser!(String))
                .value_name("NAME")
                .required(true)
                .help("Reference sequence to view"),
        )
        .arg(
            Arg::new("regions")
                .short('R')
                .long("regions")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .help("File with list of regions (one per line)"),
        )
        .arg(
            Arg::new("region")
                .short('g')
                .long("region")
                .value_parser(value_parser!(String))
                .value_name("REGION")
                .action(ArgAction::Append)
                .help("Region to view (can be repeated)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .help("Output file [default: stdout]"),
        )
        .arg(
            Arg::new("wait")
                .long("wait")
                .value_parser(value_parser!(f64))
                .value_name("SECONDS")
                .default_value("30")
                .help("Maximum time to wait for outstanding answers"),
        )
        .arg(
            Arg::new("input")
                .value_parser(value_parser!(PathBuf))
                .value_name("ALIGNMENT_FILE")
                .action(ArgAction::Append)
                .required(true)
                .help("Input alignment files (one track per file)"),
        )
}

/// Read regions from file.  Lines have either a region string in the
/// first column or three columns (contig, start, end)
fn read_region_file(p: &Path) -> anyhow::Result<Vec<Region>> {
    debug!("Reading regions from {}", p.display());
    let mut rdr = CompressIo::new()
        .path(p)
        .bufreader()
        .with_context(|| format!("Could not open region file {}", p.display()))?;
    let mut buf = String::new();
    let mut line = 0;
    let mut v = Vec::new();
    while let Some(fields) = get_next_line(&mut rdr, &mut buf)
        .with_context(|| format!("Error after reading {} lines from {}", line, p.display()))?
    {
        line += 1;
        if fields[0].is_empty() || fields[0].starts_with('#') {
            continue;
        }
        let reg = if fields.len() >= 3 {
            let from = parse_pos_with_commas(fields[1])?;
            let to = parse_pos_with_commas(fields[2])?;
            parse_region(&format!("{}:{}-{}", fields[0], from, to))
        } else {
            parse_region(fields[0])
        }
        .with_context(|| format!("{}:{} Error reading region", p.display(), line))?;
        v.push(reg)
    }
    Ok(v)
}

/// Collect regions from the command line and region file, dropping any on
/// another contig
fn get_regions(m: &ArgMatches, reference: &str) -> anyhow::Result<Vec<Region>> {
    let mut regions = match m.get_one::<PathBuf>("regions") {
        Some(p) => read_region_file(p)?,
        None => Vec::new(),
    };
    if let Some(it) = m.get_many::<String>("region") {
        for s in it {
            regions.push(parse_region(s)?)
        }
    }
    let n = regions.len();
    regions.retain(|r| r.ctg.as_deref().map(|c| c == reference).unwrap_or(true));
    if regions.len() < n {
        warn!(
            "{} regions not on reference {} ignored",
            n - regions.len(),
            reference
        )
    }
    if regions.is_empty() {
        Err(anyhow!("No regions to view on {}", reference))
    } else {
        Ok(regions)
    }
}

/// Handle command line options.  Set up Config structure
pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line
    let m = cli_model().get_matches();

    // Setup logging
    init_log(&m)?;

    debug!("Processing command line options");

    let reference = m
        .get_one::<String>("reference")
        .expect("Missing required reference")
        .to_owned();

    let regions = get_regions(&m, &reference)?;
    debug!("Number of regions: {}", regions.len());

    let mut track_cfg = TrackConfig::new();
    track_cfg.set_pad(*m.get_one::<u32>("pad").expect("Missing default pad"));
    track_cfg.set_center_tolerance(
        *m.get_one::<u32>("center_tolerance")
            .expect("Missing default centre tolerance"),
    );
    track_cfg.set_weight_mode(
        *m.get_one::<WeightMode>("weight")
            .expect("Missing default weight mode"),
    );

    let min_mapq = *m.get_one::<u8>("min_mapq").expect("Missing default mapq");
    let filter = match m.get_many::<Classification>("classes") {
        Some(it) => {
            let cl: Vec<_> = it.copied().collect();
            ReadClassFilter::new(min_mapq, &cl)
        }
        None => ReadClassFilter::default().with_min_mapq(min_mapq),
    };
    debug!("Read filter: {}", filter);

    let wait = *m.get_one::<f64>("wait").expect("Missing default wait");
    let wait = Duration::try_from_secs_f64(wait)
        .map_err(|_| anyhow!("Illegal wait time {}", wait))?;

    let inputs: Vec<_> = m
        .get_many::<PathBuf>("input")
        .expect("Missing required input files")
        .cloned()
        .collect();

    let output = m.get_one::<PathBuf>("output").map(|s| s.to_owned());
    Ok(Config::new(
        inputs, reference, regions, output, track_cfg, filter, wait,
    ))
}
