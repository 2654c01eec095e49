use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    base::{Base, Classification, Pos, Strand, N_BASES, N_CLASSES},
    filter::ReadClassFilter,
};

const PER_STRAND: usize = N_CLASSES + N_BASES;

/// Number of counters held for each reference position
pub const N_BUCKETS: usize = 2 * PER_STRAND;

#[inline]
fn class_idx(c: Classification, s: Strand) -> usize {
    s.idx() * PER_STRAND + c.idx()
}

#[inline]
fn base_idx(b: Base, s: Strand) -> usize {
    s.idx() * PER_STRAND + N_CLASSES + b.idx()
}

/// Counts at a single reference position.  For each strand there is one
/// match bucket per classification and one bucket per observed base
/// (mismatches and deletions).  Counters saturate at u32::MAX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionCounts {
    cts: [u32; N_BUCKETS],
}

impl PositionCounts {
    pub fn matches(&self, c: Classification, s: Strand) -> u32 {
        self.cts[class_idx(c, s)]
    }

    pub fn mismatches(&self, b: Base, s: Strand) -> u32 {
        self.cts[base_idx(b, s)]
    }

    /// Total over all buckets
    pub fn depth(&self) -> u64 {
        self.cts.iter().map(|x| *x as u64).sum()
    }

    pub fn strand_depth(&self, s: Strand) -> u64 {
        let i = s.idx() * PER_STRAND;
        self.cts[i..i + PER_STRAND].iter().map(|x| *x as u64).sum()
    }

    /// Matches for a classification summed over both strands
    pub fn class_depth(&self, c: Classification) -> u64 {
        Strand::ALL
            .iter()
            .map(|s| self.matches(c, *s) as u64)
            .sum()
    }

    /// Reads showing base b (summed over both strands)
    pub fn base_depth(&self, b: Base) -> u64 {
        Strand::ALL
            .iter()
            .map(|s| self.mismatches(b, *s) as u64)
            .sum()
    }

    pub fn match_depth(&self) -> u64 {
        Classification::ALL
            .iter()
            .map(|c| self.class_depth(*c))
            .sum()
    }

    pub fn mismatch_depth(&self) -> u64 {
        Base::ALL.iter().map(|b| self.base_depth(*b)).sum()
    }

    /// Add w to a match bucket.  Returns true if the counter saturated
    pub(crate) fn add_match(&mut self, c: Classification, s: Strand, w: u32) -> bool {
        add_saturating(&mut self.cts[class_idx(c, s)], w)
    }

    /// Move w counts from a match bucket to a base bucket.  Returns
    /// Ok(true) if the base counter saturated or Err(()) if the match
    /// bucket holds fewer than w counts (nothing is changed in this case)
    pub(crate) fn move_to_base(
        &mut self,
        c: Classification,
        s: Strand,
        b: Base,
        w: u32,
    ) -> Result<bool, ()> {
        let m = &mut self.cts[class_idx(c, s)];
        *m = m.checked_sub(w).ok_or(())?;
        Ok(add_saturating(&mut self.cts[base_idx(b, s)], w))
    }
}

#[inline]
fn add_saturating(x: &mut u32, w: u32) -> bool {
    match x.checked_add(w) {
        Some(y) => {
            *x = y;
            false
        }
        None => {
            *x = u32::MAX;
            true
        }
    }
}

/// Bases seen at one slot of an insertion, split by strand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertionCounts {
    cts: [[u32; N_BASES]; 2],
}

impl InsertionCounts {
    pub fn count(&self, b: Base, s: Strand) -> u32 {
        self.cts[s.idx()][b.idx()]
    }

    pub fn total(&self) -> u64 {
        self.cts.iter().flatten().map(|x| *x as u64).sum()
    }

    pub(crate) fn add(&mut self, b: Base, s: Strand, w: u32) -> bool {
        add_saturating(&mut self.cts[s.idx()][b.idx()], w)
    }
}

/// CoverageWindow
///
/// Immutable snapshot of coverage over [from, to] (1-based, inclusive)
/// for one reference and one read filter.  Once constructed it is only
/// ever shared (behind an Arc), never changed.
///
/// counts - one entry per position, counts[0] is position from
/// insertions - inserted bases keyed on (position, order within insertion)
/// saturated - true if any counter hit its maximum during aggregation
///
pub struct CoverageWindow {
    ref_id: Arc<str>,
    from: Pos,
    to: Pos,
    filter: ReadClassFilter,
    counts: Vec<PositionCounts>,
    insertions: BTreeMap<(Pos, u16), InsertionCounts>,
    saturated: bool,
}

impl CoverageWindow {
    pub(crate) fn new(
        ref_id: Arc<str>,
        from: Pos,
        to: Pos,
        filter: ReadClassFilter,
        counts: Vec<PositionCounts>,
        insertions: BTreeMap<(Pos, u16), InsertionCounts>,
        saturated: bool,
    ) -> Self {
        assert!(from <= to && counts.len() == (to - from) as usize + 1);
        Self {
            ref_id,
            from,
            to,
            filter,
            counts,
            insertions,
            saturated,
        }
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
    }

    pub fn from(&self) -> Pos {
        self.from
    }

    pub fn to(&self) -> Pos {
        self.to
    }

    pub fn filter(&self) -> &ReadClassFilter {
        &self.filter
    }

    /// Number of positions in window
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    /// True iff [from, to] lies completely within this window
    pub fn covers(&self, from: Pos, to: Pos) -> bool {
        self.from <= from && to <= self.to
    }

    /// True if this window can answer a request for [from, to] with filter
    pub fn serves(&self, filter: &ReadClassFilter, from: Pos, to: Pos) -> bool {
        self.filter == *filter && self.covers(from, to)
    }

    pub fn get(&self, pos: Pos) -> Option<&PositionCounts> {
        if self.covers(pos, pos) {
            self.counts.get((pos - self.from) as usize)
        } else {
            None
        }
    }

    pub fn depth(&self, pos: Pos) -> Option<u64> {
        self.get(pos).map(|c| c.depth())
    }

    /// Counts for [from, to] or None if not covered
    pub fn slice(&self, from: Pos, to: Pos) -> Option<&[PositionCounts]> {
        if from <= to && self.covers(from, to) {
            let a = (from - self.from) as usize;
            let b = (to - self.from) as usize;
            Some(&self.counts[a..=b])
        } else {
            None
        }
    }

    /// Iterate over (position, counts) for the whole window
    pub fn iter(&self) -> impl Iterator<Item = (Pos, &PositionCounts)> + '_ {
        (self.from..=self.to).zip(self.counts.iter())
    }

    /// Inserted bases after pos ordered by their place in the insertion
    pub fn insertions_at(&self, pos: Pos) -> impl Iterator<Item = (u16, &InsertionCounts)> + '_ {
        self.insertions
            .range((pos, 0)..=(pos, u16::MAX))
            .map(|((_, o), c)| (*o, c))
    }

    /// Longest insertion observed after pos (number of slots to render)
    pub fn max_insertion_len(&self, pos: Pos) -> usize {
        self.insertions_at(pos)
            .last()
            .map(|(o, _)| o as usize + 1)
            .unwrap_or(0)
    }
}

impl fmt::Debug for CoverageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CoverageWindow({}:{}-{}, {}, {} insertion slots{})",
            self.ref_id,
            self.from,
            self.to,
            self.filter,
            self.insertions.len(),
            if self.saturated { ", saturated" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(from: Pos, to: Pos) -> CoverageWindow {
        let n = (to - from + 1) as usize;
        CoverageWindow::new(
            Arc::from("chr1"),
            from,
            to,
            ReadClassFilter::default(),
            vec![PositionCounts::default(); n],
            BTreeMap::new(),
            false,
        )
    }

    #[test]
    fn covers() {
        let w = window(100, 200);
        assert!(w.covers(100, 200));
        assert!(w.covers(150, 150));
        assert!(!w.covers(99, 150));
        assert!(!w.covers(150, 201));
        assert_eq!(w.len(), 101);
        assert!(w.get(99).is_none());
        assert_eq!(w.depth(200), Some(0));
        assert_eq!(w.slice(110, 119).map(|s| s.len()), Some(10));
        assert!(w.slice(190, 210).is_none());
    }

    #[test]
    fn serves_needs_same_filter() {
        let w = window(100, 200);
        let f = ReadClassFilter::default();
        assert!(w.serves(&f, 120, 130));
        assert!(!w.serves(&f.with_min_mapq(10), 120, 130));
        assert!(!w.serves(&f, 90, 130));
    }

    #[test]
    fn bucket_moves() {
        let mut c = PositionCounts::default();
        c.add_match(Classification::Perfect, Strand::Forward, 3);
        c.add_match(Classification::Other, Strand::Reverse, 2);
        assert_eq!(c.depth(), 5);
        assert_eq!(
            c.move_to_base(Classification::Perfect, Strand::Forward, Base::G, 1),
            Ok(false)
        );
        assert_eq!(c.matches(Classification::Perfect, Strand::Forward), 2);
        assert_eq!(c.mismatches(Base::G, Strand::Forward), 1);
        assert_eq!(c.depth(), 5);
        assert_eq!(c.match_depth() + c.mismatch_depth(), 5);
        assert_eq!(c.strand_depth(Strand::Forward), 3);
        assert_eq!(c.strand_depth(Strand::Reverse), 2);
        // Cannot take more than is there
        assert_eq!(
            c.move_to_base(Classification::Best, Strand::Forward, Base::A, 1),
            Err(())
        );
        assert_eq!(c.depth(), 5);
    }

    #[test]
    fn saturation() {
        let mut c = PositionCounts::default();
        assert!(!c.add_match(Classification::Best, Strand::Forward, u32::MAX - 1));
        assert!(c.add_match(Classification::Best, Strand::Forward, 5));
        assert_eq!(c.matches(Classification::Best, Strand::Forward), u32::MAX);
    }

    #[test]
    fn insertion_order() {
        let mut ins = BTreeMap::new();
        let mut a = InsertionCounts::default();
        a.add(Base::A, Strand::Forward, 2);
        let mut b = InsertionCounts::default();
        b.add(Base::T, Strand::Reverse, 1);
        ins.insert((150, 1), b);
        ins.insert((150, 0), a);
        ins.insert((151, 0), a);
        let w = CoverageWindow::new(
            Arc::from("chr1"),
            100,
            200,
            ReadClassFilter::default(),
            vec![PositionCounts::default(); 101],
            ins,
            false,
        );
        let v: Vec<_> = w.insertions_at(150).map(|(o, c)| (o, c.total())).collect();
        assert_eq!(v, vec![(0, 2), (1, 1)]);
        assert_eq!(w.max_insertion_len(150), 2);
        assert_eq!(w.max_insertion_len(151), 1);
        assert_eq!(w.max_insertion_len(152), 0);
    }
}
