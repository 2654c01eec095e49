use std::fmt;

use crate::{base::Classification, record::AlignmentRecord};

/// ReadClassFilter
///
/// Which alignments contribute to a coverage window.  Two requests with
/// different filters never share a cached window.
///
/// min_mapq - minimum mapping quality
/// classes - bit set of accepted classifications (bit i = Classification::ALL[i])
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadClassFilter {
    min_mapq: u8,
    classes: u8,
}

const ALL_CLASSES: u8 = (1 << Classification::ALL.len()) - 1;

impl Default for ReadClassFilter {
    fn default() -> Self {
        Self {
            min_mapq: 0,
            classes: ALL_CLASSES,
        }
    }
}

impl ReadClassFilter {
    pub fn new(min_mapq: u8, classes: &[Classification]) -> Self {
        let classes = classes.iter().fold(0, |s, c| s | (1 << c.idx()));
        Self { min_mapq, classes }
    }

    pub fn with_min_mapq(mut self, x: u8) -> Self {
        self.min_mapq = x;
        self
    }

    pub fn excluding(mut self, c: Classification) -> Self {
        self.classes &= !(1 << c.idx());
        self
    }

    pub fn min_mapq(&self) -> u8 {
        self.min_mapq
    }

    pub fn accepts(&self, c: Classification) -> bool {
        (self.classes & (1 << c.idx())) != 0
    }

    pub fn pass(&self, rec: &AlignmentRecord) -> bool {
        rec.mapq >= self.min_mapq && self.accepts(rec.classification)
    }
}

impl fmt::Display for ReadClassFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mapq>={} classes=", self.min_mapq)?;
        let mut first = true;
        for c in Classification::ALL.iter().filter(|c| self.accepts(**c)) {
            if !first {
                f.write_str(",")?
            }
            write!(f, "{}", c)?;
            first = false;
        }
        if first {
            f.write_str("none")?
        }
        Ok(())
    }
}
