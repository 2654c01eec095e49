//! Plain text alignment files
//!
//! Tab separated, optionally compressed.  Lines starting with '#' are
//! comments.  References are declared by header lines:
//!
//!   @SQ  name  length
//!
//! and alignments are given one per line:
//!
//!   ref  start  stop  strand  class  [mapq  [multiplicity  [mismatches  [insertions]]]]
//!
//! where mismatches is a comma separated list of pos:base and insertions a
//! list of pos:base:order ('.' for an empty list).
use std::{collections::HashSet, path::Path};

use anyhow::Context;
use compress_io::compress::CompressIo;
use utils::get_next_line;

use crate::{
    base::{Base, Classification, Pos, Strand},
    record::{AlignmentRecord, Insertion, Mismatch},
    source::MemorySource,
};

fn parse_list<'a>(s: &'a str) -> impl Iterator<Item = Vec<&'a str>> + 'a {
    let s = if s == "." { "" } else { s };
    s.split(',')
        .filter(|x| !x.is_empty())
        .map(|x| x.split(':').collect())
}

fn parse_mismatches(s: &str, rec: &mut AlignmentRecord) -> anyhow::Result<()> {
    for v in parse_list(s) {
        if v.len() != 2 {
            return Err(anyhow!("Mismatch entry should be pos:base"));
        }
        let pos = v[0].parse::<Pos>().context("Bad mismatch position")?;
        let base = v[1].parse::<Base>()?;
        rec.mismatches.push(Mismatch { pos, base })
    }
    Ok(())
}

fn parse_insertions(s: &str, rec: &mut AlignmentRecord) -> anyhow::Result<()> {
    for v in parse_list(s) {
        if v.len() != 3 {
            return Err(anyhow!("Insertion entry should be pos:base:order"));
        }
        let pos = v[0].parse::<Pos>().context("Bad insertion position")?;
        let base = v[1].parse::<Base>()?;
        let order = v[2].parse::<u16>().context("Bad insertion order")?;
        rec.insertions.push(Insertion { pos, base, order })
    }
    Ok(())
}

/// Parse an alignment line, returning the reference name and the record
fn parse_record<'a>(fields: &[&'a str]) -> anyhow::Result<(&'a str, AlignmentRecord)> {
    if fields.len() < 5 {
        return Err(anyhow!("Too few fields ({})", fields.len()));
    }
    let start = fields[1].parse::<Pos>().context("Bad start position")?;
    let stop = fields[2].parse::<Pos>().context("Bad stop position")?;
    let strand = fields[3].parse::<Strand>()?;
    let class = fields[4].parse::<Classification>()?;
    let mut rec = AlignmentRecord::new(start, stop, strand, class);
    if let Some(s) = fields.get(5) {
        rec = rec.with_mapq(s.parse::<u8>().context("Bad mapping quality")?)
    }
    if let Some(s) = fields.get(6) {
        rec = rec.with_multiplicity(s.parse::<u32>().context("Bad multiplicity")?)
    }
    if let Some(s) = fields.get(7) {
        parse_mismatches(s, &mut rec)?
    }
    if let Some(s) = fields.get(8) {
        parse_insertions(s, &mut rec)?
    }
    Ok((fields[0], rec))
}

/// Read an alignment file into an indexed in-memory source.  Failure to open
/// or read the file is an error; malformed lines are logged and skipped
pub fn read_alignment_file<P: AsRef<Path>>(path: P) -> anyhow::Result<MemorySource> {
    let p = path.as_ref();
    debug!("Reading alignments from {}", p.display());
    let mut rdr = CompressIo::new()
        .path(p)
        .bufreader()
        .with_context(|| format!("Could not open alignment file {}", p.display()))?;

    let mut src = MemorySource::new(p.display().to_string());
    let mut buf = String::new();
    let mut line = 0;
    let mut n_bad = 0;
    let mut missing_refs = HashSet::new();

    while let Some(fields) = get_next_line(&mut rdr, &mut buf)
        .with_context(|| format!("Error after reading {} lines from {}", line, p.display()))?
    {
        line += 1;
        match fields[0] {
            "" => continue,
            s if s.starts_with('#') => continue,
            "@SQ" => {
                if fields.len() < 3 {
                    warn!("{}:{} Short @SQ line", p.display(), line);
                    n_bad += 1;
                    continue;
                }
                match utils::parse_pos_with_commas(fields[2]) {
                    Ok(l) => src.add_reference(fields[1], l),
                    Err(e) => {
                        warn!("{}:{} {}", p.display(), line, e);
                        n_bad += 1
                    }
                }
            }
            _ => match parse_record(&fields) {
                Ok((ctg, rec)) => {
                    if src.push(ctg, rec).is_err() && missing_refs.insert(ctg.to_owned()) {
                        warn!(
                            "{}:{} Reference {} not declared; alignments skipped",
                            p.display(),
                            line,
                            ctg
                        )
                    }
                }
                Err(e) => {
                    warn!("{}:{} Skipping line: {:#}", p.display(), line, e);
                    n_bad += 1
                }
            },
        }
    }
    src.index();
    debug!(
        "Read {} alignments on {} references from {} ({} lines skipped)",
        src.n_records(),
        src.n_references(),
        p.display(),
        n_bad
    );
    Ok(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::AlignmentSource;
    use std::io::Write;

    #[test]
    fn parse_line() {
        let f = ["chr1", "100", "120", "-", "best", "30", "2", "107:G,110:-", "112:A:0,112:C:1"];
        let (ctg, r) = parse_record(&f).unwrap();
        assert_eq!(ctg, "chr1");
        assert_eq!((r.start, r.stop, r.strand), (100, 120, Strand::Reverse));
        assert_eq!(r.classification, Classification::Best);
        assert_eq!((r.mapq, r.multiplicity), (30, 2));
        assert_eq!(r.mismatches.len(), 2);
        assert_eq!(r.mismatches[1].base, Base::Gap);
        assert_eq!(r.insertions[1].order, 1);

        let (_, r) = parse_record(&["chr1", "5", "9", "+", "perfect", "60", "1", "."]).unwrap();
        assert!(r.mismatches.is_empty());

        assert!(parse_record(&["chr1", "5", "9", "+"]).is_err());
        assert!(parse_record(&["chr1", "5", "x", "+", "other"]).is_err());
        assert!(parse_record(&["chr1", "5", "9", "+", "other", "60", "1", "7"]).is_err());
    }

    #[test]
    fn read_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# test alignments").unwrap();
        writeln!(f, "@SQ\tchr1\t10,000").unwrap();
        writeln!(f, "chr1\t100\t120\t+\tperfect").unwrap();
        writeln!(f, "chr1\t50\t60\t-\tother\t10").unwrap();
        writeln!(f, "chr1\tbad\t60\t-\tother").unwrap();
        writeln!(f, "chr2\t50\t60\t-\tother").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "chr1\t110\t130\t+\tbest\t60\t1\t115:T\t.").unwrap();
        f.flush().unwrap();

        let mut src = read_alignment_file(f.path()).unwrap();
        assert_eq!(src.n_references(), 1);
        assert_eq!(src.n_records(), 3);
        assert_eq!(src.reference_length("chr1"), Some(10_000));
        let starts: Vec<_> = src
            .query_overlapping("chr1", 115, 115)
            .unwrap()
            .map(|r| r.unwrap().start)
            .collect();
        assert_eq!(starts, vec![100, 110]);
    }

    #[test]
    fn missing_file() {
        assert!(read_alignment_file("/nonexistent/dir/aln.tsv").is_err());
    }
}
