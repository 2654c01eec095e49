use std::collections::HashSet;

use crate::base::{Base, Classification, Pos, Strand};

/// A base in the read differing from the reference at pos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub pos: Pos,
    pub base: Base,
}

/// A base inserted in the read after reference position pos.  order gives
/// the position of the base within the inserted run (0 for the first base)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    pub pos: Pos,
    pub base: Base,
    pub order: u16,
}

/// AlignmentRecord
///
/// One aligned read (or group of collapsed duplicate reads) as yielded by
/// an alignment source.  Coordinates are 1-based and inclusive.
///
/// multiplicity - number of reads this record stands for
/// mismatches - sorted on position, at most one entry per position
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub start: Pos,
    pub stop: Pos,
    pub strand: Strand,
    pub classification: Classification,
    pub mapq: u8,
    pub multiplicity: u32,
    pub mismatches: Vec<Mismatch>,
    pub insertions: Vec<Insertion>,
}

impl AlignmentRecord {
    pub fn new(start: Pos, stop: Pos, strand: Strand, classification: Classification) -> Self {
        Self {
            start,
            stop,
            strand,
            classification,
            mapq: 255,
            multiplicity: 1,
            mismatches: Vec::new(),
            insertions: Vec::new(),
        }
    }

    pub fn with_mapq(mut self, mapq: u8) -> Self {
        self.mapq = mapq;
        self
    }

    pub fn with_multiplicity(mut self, n: u32) -> Self {
        self.multiplicity = n;
        self
    }

    pub fn with_mismatch(mut self, pos: Pos, base: Base) -> Self {
        self.mismatches.push(Mismatch { pos, base });
        self
    }

    pub fn with_insertion(mut self, pos: Pos, base: Base, order: u16) -> Self {
        self.insertions.push(Insertion { pos, base, order });
        self
    }

    /// True if [start, stop] intersects [from, to]
    #[inline]
    pub fn overlaps(&self, from: Pos, to: Pos) -> bool {
        self.start <= to && self.stop >= from
    }

    pub fn span(&self) -> Pos {
        self.stop - self.start + 1
    }

    /// Check internal consistency.  A record that fails here is skipped by
    /// the aggregator
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.start == 0 {
            return Err(anyhow!("Record start 0 (coordinates are 1-based)"));
        }
        if self.start > self.stop {
            return Err(anyhow!(
                "Record start {} after stop {}",
                self.start,
                self.stop
            ));
        }
        if self.multiplicity == 0 {
            return Err(anyhow!("Record at {} has zero multiplicity", self.start));
        }
        let mut prev = None;
        for m in self.mismatches.iter() {
            if m.pos < self.start || m.pos > self.stop {
                return Err(anyhow!(
                    "Mismatch at {} outside of record {}-{}",
                    m.pos,
                    self.start,
                    self.stop
                ));
            }
            if matches!(prev, Some(p) if p >= m.pos) {
                return Err(anyhow!(
                    "Mismatches for record at {} not sorted or repeated at {}",
                    self.start,
                    m.pos
                ));
            }
            prev = Some(m.pos)
        }
        let mut seen = HashSet::with_capacity(self.insertions.len());
        for i in self.insertions.iter() {
            if i.pos < self.start || i.pos > self.stop {
                return Err(anyhow!(
                    "Insertion at {} outside of record {}-{}",
                    i.pos,
                    self.start,
                    self.stop
                ));
            }
            if !seen.insert((i.pos, i.order)) {
                return Err(anyhow!(
                    "Repeated insertion at {} (order {}) for record at {}",
                    i.pos,
                    i.order,
                    self.start
                ));
            }
        }
        Ok(())
    }
}
