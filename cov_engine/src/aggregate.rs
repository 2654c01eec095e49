use std::{collections::BTreeMap, sync::Arc};

use crate::{
    base::Pos,
    config::WeightMode,
    error::TrackError,
    filter::ReadClassFilter,
    record::AlignmentRecord,
    window::{CoverageWindow, InsertionCounts, PositionCounts},
};

/// Per-window record accounting, logged when a window is finished
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStats {
    pub used: usize,
    pub filtered: usize,
    pub outside: usize,
    pub skipped: usize,
    /// Saturation warnings issued (at most one per window)
    pub saturation_warnings: usize,
}

/// CoverageAggregator
///
/// Accumulates alignment records into per-position counts for the
/// window [from, to].  Records are only read; nothing from them is kept
/// apart from the counts.
///
/// expected - total weight added per position, checked against the bucket
///            totals when the window is finished
///
pub struct CoverageAggregator {
    ref_id: Arc<str>,
    from: Pos,
    to: Pos,
    filter: ReadClassFilter,
    weight_mode: WeightMode,
    counts: Vec<PositionCounts>,
    expected: Vec<u64>,
    insertions: BTreeMap<(Pos, u16), InsertionCounts>,
    saturated: bool,
    violation: Option<(Pos, String)>,
    stats: AggregateStats,
}

impl CoverageAggregator {
    pub fn new(
        ref_id: Arc<str>,
        from: Pos,
        to: Pos,
        filter: ReadClassFilter,
        weight_mode: WeightMode,
    ) -> Self {
        assert!(from <= to, "Empty coverage window");
        let n = (to - from) as usize + 1;
        Self {
            ref_id,
            from,
            to,
            filter,
            weight_mode,
            counts: vec![PositionCounts::default(); n],
            expected: vec![0; n],
            insertions: BTreeMap::new(),
            saturated: false,
            violation: None,
            stats: AggregateStats::default(),
        }
    }

    pub fn stats(&self) -> &AggregateStats {
        &self.stats
    }

    fn note_saturation(&mut self, sat: bool) {
        if sat && !self.saturated {
            warn!(
                "Coverage counters saturated in window {}:{}-{}",
                self.ref_id, self.from, self.to
            );
            self.saturated = true;
            self.stats.saturation_warnings += 1
        }
    }

    /// Add a record (or a per-record error from the source) to the window.
    /// Malformed records are logged and skipped
    pub fn add(&mut self, rec: anyhow::Result<AlignmentRecord>) {
        match rec {
            Ok(r) => self.add_record(&r),
            Err(e) => {
                warn!("Skipping unreadable alignment record: {:#}", e);
                self.stats.skipped += 1
            }
        }
    }

    pub fn add_record(&mut self, rec: &AlignmentRecord) {
        if let Err(e) = rec.validate() {
            warn!("Skipping malformed alignment record: {}", e);
            self.stats.skipped += 1;
            return;
        }
        if !self.filter.pass(rec) {
            self.stats.filtered += 1;
            return;
        }
        // Clip record to window
        let x = rec.start.max(self.from);
        let y = rec.stop.min(self.to);
        if x > y {
            self.stats.outside += 1;
            return;
        }
        self.stats.used += 1;

        let w = self.weight_mode.weight(rec);
        let (c, s) = (rec.classification, rec.strand);
        let off = (x - self.from) as usize;
        let end = (y - self.from) as usize;
        let mut sat = false;
        for (ct, ex) in self.counts[off..=end]
            .iter_mut()
            .zip(self.expected[off..=end].iter_mut())
        {
            sat |= ct.add_match(c, s, w);
            *ex += w as u64;
        }

        // Mismatches move counts from the match bucket to the base bucket
        for m in rec.mismatches.iter().filter(|m| m.pos >= x && m.pos <= y) {
            let ct = &mut self.counts[(m.pos - self.from) as usize];
            match ct.move_to_base(c, s, m.base, w) {
                Ok(z) => sat |= z,
                Err(_) => {
                    if self.violation.is_none() {
                        self.violation = Some((
                            m.pos,
                            format!("{} {} match count below {}", c, s, w),
                        ))
                    }
                }
            }
        }

        for i in rec.insertions.iter().filter(|i| i.pos >= x && i.pos <= y) {
            sat |= self
                .insertions
                .entry((i.pos, i.order))
                .or_default()
                .add(i.base, s, w);
        }
        self.note_saturation(sat)
    }

    /// Check the per position totals and build the window.  Any
    /// inconsistency fails the whole window
    pub fn finish(self) -> Result<CoverageWindow, TrackError> {
        if let Some((pos, message)) = self.violation {
            return Err(TrackError::Invariant {
                ref_id: self.ref_id.to_string(),
                pos,
                message,
            });
        }
        // Totals can not be compared once counters have saturated
        if !self.saturated {
            if let Some((i, (ct, ex))) = self
                .counts
                .iter()
                .zip(self.expected.iter())
                .enumerate()
                .find(|(_, (ct, ex))| ct.depth() != **ex)
            {
                return Err(TrackError::Invariant {
                    ref_id: self.ref_id.to_string(),
                    pos: self.from + i as Pos,
                    message: format!("bucket total {} != coverage {}", ct.depth(), ex),
                });
            }
        }
        debug!(
            "Window {}:{}-{} complete: {} records used, {} filtered, {} outside, {} skipped, {} saturation warnings",
            self.ref_id,
            self.from,
            self.to,
            self.stats.used,
            self.stats.filtered,
            self.stats.outside,
            self.stats.skipped,
            self.stats.saturation_warnings
        );
        Ok(CoverageWindow::new(
            self.ref_id,
            self.from,
            self.to,
            self.filter,
            self.counts,
            self.insertions,
            self.saturated,
        ))
    }
}

/// Build a coverage window for [from, to] from a stream of records
pub fn aggregate<I>(
    records: I,
    ref_id: Arc<str>,
    from: Pos,
    to: Pos,
    filter: ReadClassFilter,
    weight_mode: WeightMode,
) -> Result<(CoverageWindow, AggregateStats), TrackError>
where
    I: IntoIterator<Item = anyhow::Result<AlignmentRecord>>,
{
    let mut agg = CoverageAggregator::new(ref_id, from, to, filter, weight_mode);
    for rec in records {
        agg.add(rec)
    }
    let stats = agg.stats;
    agg.finish().map(|w| (w, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Base, Classification, Strand};

    fn perfect(start: Pos, stop: Pos) -> AlignmentRecord {
        AlignmentRecord::new(start, stop, Strand::Forward, Classification::Perfect)
    }

    fn run(recs: Vec<AlignmentRecord>, from: Pos, to: Pos) -> CoverageWindow {
        run_with(recs, from, to, WeightMode::PerRecord)
    }

    fn run_with(recs: Vec<AlignmentRecord>, from: Pos, to: Pos, wm: WeightMode) -> CoverageWindow {
        aggregate(
            recs.into_iter().map(Ok::<_, anyhow::Error>),
            Arc::from("chr1"),
            from,
            to,
            ReadClassFilter::default(),
            wm,
        )
        .unwrap()
        .0
    }

    #[test]
    fn three_perfect_reads() {
        let recs = vec![perfect(100, 120), perfect(100, 120), perfect(100, 120)];
        let w = run(recs, 105, 110);
        assert_eq!(w.len(), 6);
        for (_, ct) in w.iter() {
            assert_eq!(ct.matches(Classification::Perfect, Strand::Forward), 3);
            assert_eq!(ct.depth(), 3);
            assert_eq!(ct.class_depth(Classification::Best), 0);
            assert_eq!(ct.class_depth(Classification::Other), 0);
            assert_eq!(ct.strand_depth(Strand::Reverse), 0);
            assert_eq!(ct.mismatch_depth(), 0);
        }
    }

    #[test]
    fn mismatch_moves_count() {
        let recs = vec![
            perfect(100, 120),
            perfect(100, 120).with_mismatch(107, Base::G),
            perfect(100, 120),
        ];
        let w = run(recs, 100, 120);
        let ct = w.get(107).unwrap();
        assert_eq!(ct.matches(Classification::Perfect, Strand::Forward), 2);
        assert_eq!(ct.mismatches(Base::G, Strand::Forward), 1);
        assert_eq!(ct.depth(), 3);
        assert_eq!(w.get(106).unwrap().mismatch_depth(), 0);
    }

    #[test]
    fn totals_match_clipped_depth() {
        let recs = vec![
            perfect(1, 50).with_mismatch(10, Base::A).with_mismatch(45, Base::Gap),
            AlignmentRecord::new(30, 80, Strand::Reverse, Classification::Best)
                .with_mismatch(31, Base::C)
                .with_mismatch(79, Base::T),
            AlignmentRecord::new(45, 46, Strand::Forward, Classification::Other),
            AlignmentRecord::new(70, 200, Strand::Reverse, Classification::Other)
                .with_mismatch(150, Base::N),
        ];
        let w = run(recs.clone(), 20, 100);
        for (pos, ct) in w.iter() {
            let depth = recs.iter().filter(|r| r.overlaps(pos, pos)).count() as u64;
            assert_eq!(ct.depth(), depth, "position {}", pos);
            assert_eq!(ct.match_depth() + ct.mismatch_depth(), depth);
        }
        assert_eq!(w.get(45).unwrap().base_depth(Base::Gap), 1);
        assert_eq!(w.get(79).unwrap().mismatches(Base::T, Strand::Reverse), 1);
    }

    #[test]
    fn cached_window_matches_direct() {
        let recs = vec![
            perfect(90, 140).with_mismatch(101, Base::T),
            AlignmentRecord::new(95, 130, Strand::Reverse, Classification::Best)
                .with_insertion(110, Base::A, 0)
                .with_insertion(110, Base::C, 1),
            perfect(108, 108),
        ];
        let wide = run(recs.clone(), 1, 1000);
        let narrow = run(recs, 100, 120);
        assert_eq!(wide.slice(100, 120), narrow.slice(100, 120));
        let a: Vec<_> = wide.insertions_at(110).collect();
        let b: Vec<_> = narrow.insertions_at(110).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn insertions_ordered() {
        let recs = vec![
            perfect(100, 120)
                .with_insertion(105, Base::A, 0)
                .with_insertion(105, Base::G, 1),
            AlignmentRecord::new(100, 120, Strand::Reverse, Classification::Perfect)
                .with_insertion(105, Base::A, 0),
            perfect(100, 120).with_insertion(115, Base::T, 0),
        ];
        let w = run(recs, 100, 110);
        let v: Vec<_> = w.insertions_at(105).collect();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].0, 0);
        assert_eq!(v[0].1.count(Base::A, Strand::Forward), 1);
        assert_eq!(v[0].1.count(Base::A, Strand::Reverse), 1);
        assert_eq!(v[1].1.count(Base::G, Strand::Forward), 1);
        assert_eq!(w.max_insertion_len(105), 2);
        // Insertions do not add to reference position depth
        assert_eq!(w.depth(105), Some(3));
    }

    #[test]
    fn multiplicity_weights() {
        let recs = vec![
            perfect(10, 20).with_multiplicity(4).with_mismatch(15, Base::C),
            perfect(10, 20),
        ];
        let w = run_with(recs.clone(), 10, 20, WeightMode::Multiplicity);
        assert_eq!(w.depth(12), Some(5));
        assert_eq!(w.get(15).unwrap().base_depth(Base::C), 4);
        let w = run_with(recs, 10, 20, WeightMode::PerRecord);
        assert_eq!(w.depth(12), Some(2));
        assert_eq!(w.get(15).unwrap().base_depth(Base::C), 1);
    }

    #[test]
    fn bad_records_skipped() {
        let recs = vec![
            Ok(perfect(10, 20)),
            Err(anyhow!("truncated record")),
            Ok(perfect(30, 20)),
            Ok(perfect(10, 20).with_mismatch(25, Base::A)),
            Ok(perfect(15, 25)),
        ];
        let (w, stats) = aggregate(
            recs,
            Arc::from("chr1"),
            1,
            30,
            ReadClassFilter::default(),
            WeightMode::PerRecord,
        )
        .unwrap();
        assert_eq!(stats.used, 2);
        assert_eq!(stats.skipped, 3);
        assert_eq!(w.depth(16), Some(2));
    }

    #[test]
    fn filter_applied() {
        let recs = vec![
            perfect(10, 20).with_mapq(5),
            AlignmentRecord::new(10, 20, Strand::Forward, Classification::Other),
            perfect(10, 20),
            perfect(500, 600),
        ];
        let filter = ReadClassFilter::default()
            .with_min_mapq(10)
            .excluding(Classification::Other);
        let (w, stats) = aggregate(
            recs.into_iter().map(Ok::<_, anyhow::Error>),
            Arc::from("chr1"),
            1,
            100,
            filter,
            WeightMode::PerRecord,
        )
        .unwrap();
        assert_eq!(w.depth(15), Some(1));
        assert_eq!(stats.filtered, 2);
        assert_eq!(stats.outside, 1);
        assert_eq!(w.filter(), &filter);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        let recs = vec![
            perfect(1, 3).with_multiplicity(u32::MAX - 1),
            perfect(2, 3).with_multiplicity(10),
        ];
        let w = run_with(recs, 1, 3, WeightMode::Multiplicity);
        assert!(w.is_saturated());
        assert_eq!(w.depth(1), Some((u32::MAX - 1) as u64));
        assert_eq!(
            w.get(2).unwrap().matches(Classification::Perfect, Strand::Forward),
            u32::MAX
        );
    }

    #[test]
    fn saturation_warned_once_per_window() {
        let mut agg = CoverageAggregator::new(
            Arc::from("chr1"),
            1,
            10,
            ReadClassFilter::default(),
            WeightMode::Multiplicity,
        );
        for _ in 0..5 {
            agg.add_record(&perfect(1, 10).with_multiplicity(u32::MAX));
        }
        let mut ins = perfect(1, 10).with_multiplicity(u32::MAX);
        ins.insertions.push(crate::record::Insertion {
            pos: 4,
            base: Base::A,
            order: 0,
        });
        agg.add_record(&ins);
        agg.add_record(&ins);
        assert_eq!(agg.stats().used, 7);
        assert_eq!(agg.stats().saturation_warnings, 1);
        let w = agg.finish().unwrap();
        assert!(w.is_saturated());
        assert_eq!(w.depth(4), Some(u32::MAX as u64));

        // A fresh window warns again
        let (_, st) = aggregate(
            (0..2).map(|_| Ok::<_, anyhow::Error>(perfect(1, 3).with_multiplicity(u32::MAX))),
            Arc::from("chr1"),
            1,
            3,
            ReadClassFilter::default(),
            WeightMode::Multiplicity,
        )
        .unwrap();
        assert_eq!(st.saturation_warnings, 1);

        // No saturation, no warning
        let (_, st) = aggregate(
            vec![Ok::<_, anyhow::Error>(perfect(1, 3))],
            Arc::from("chr1"),
            1,
            3,
            ReadClassFilter::default(),
            WeightMode::PerRecord,
        )
        .unwrap();
        assert_eq!(st.saturation_warnings, 0);
    }
}
