use std::io::Write;

use cov_engine::{Base, Classification, CoverageWindow, Pos, Strand, TrackId};

pub const HEADER: &str =
    "track\tregion\tpos\tdepth\tfwd\trev\tperfect\tbest\tother\tA\tC\tG\tT\tN\tdel\tins";

/// Write one row per position of [from, to], which must be covered by w.
/// ins is the number of reads with an insertion after the position
pub fn write_region<W: Write>(
    wrt: &mut W,
    track: TrackId,
    from: Pos,
    to: Pos,
    w: &CoverageWindow,
) -> anyhow::Result<()> {
    let cts = w.slice(from, to).ok_or_else(|| {
        anyhow!(
            "Window {}:{}-{} does not cover {}-{}",
            w.ref_id(),
            w.from(),
            w.to(),
            from,
            to
        )
    })?;
    let region = format!("{}:{}-{}", w.ref_id(), from, to);
    for (pos, c) in (from..=to).zip(cts.iter()) {
        let ins = w
            .insertions_at(pos)
            .next()
            .filter(|(o, _)| *o == 0)
            .map(|(_, x)| x.total())
            .unwrap_or(0);
        write!(
            wrt,
            "{}\t{}\t{}\t{}\t{}\t{}",
            track,
            region,
            pos,
            c.depth(),
            c.strand_depth(Strand::Forward),
            c.strand_depth(Strand::Reverse)
        )?;
        for cl in Classification::ALL {
            write!(wrt, "\t{}", c.class_depth(cl))?
        }
        for b in Base::ALL {
            write!(wrt, "\t{}", c.base_depth(b))?
        }
        writeln!(wrt, "\t{}", ins)?
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cov_engine::{aggregate, AlignmentRecord, ReadClassFilter, WeightMode};
    use std::sync::Arc;

    #[test]
    fn rows() {
        let recs = vec![
            AlignmentRecord::new(100, 120, Strand::Forward, Classification::Perfect)
                .with_mismatch(107, Base::G),
            AlignmentRecord::new(105, 130, Strand::Reverse, Classification::Other)
                .with_mismatch(106, Base::Gap)
                .with_insertion(106, Base::A, 0)
                .with_insertion(106, Base::A, 1),
        ];
        let (w, _) = aggregate(
            recs.into_iter().map(Ok::<_, anyhow::Error>),
            Arc::from("chr1"),
            90,
            140,
            ReadClassFilter::default(),
            WeightMode::PerRecord,
        )
        .unwrap();

        let mut out = Vec::new();
        write_region(&mut out, TrackId(2), 105, 107, &w).unwrap();
        let s = String::from_utf8(out).unwrap();
        let lines: Vec<_> = s.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "2\tchr1:105-107\t105\t2\t1\t1\t1\t0\t1\t0\t0\t0\t0\t0\t0\t0");
        assert_eq!(lines[1], "2\tchr1:105-107\t106\t2\t1\t1\t1\t0\t0\t0\t0\t0\t0\t0\t1\t1");
        assert_eq!(lines[2], "2\tchr1:105-107\t107\t2\t1\t1\t0\t0\t1\t0\t0\t1\t0\t0\t0\t0");
        assert_eq!(HEADER.split('\t').count(), lines[0].split('\t').count());

        assert!(write_region(&mut Vec::<u8>::new(), TrackId(2), 80, 100, &w).is_err());
    }
}
