use std::{collections::HashMap, sync::Arc};

use crate::{base::Pos, record::AlignmentRecord};

/// Records yielded by a query.  An Err item is a problem with a single
/// record; the rest of the query is still usable
pub type RecordIter<'a> = Box<dyn Iterator<Item = anyhow::Result<AlignmentRecord>> + 'a>;

/// Source of alignments for a track (an indexed alignment file or similar).
///
/// query_overlapping() must return every record whose [start, stop] intersects
/// [from, to] and may be called any number of times with overlapping ranges.
/// An Err from query_overlapping() means the query as a whole failed.
pub trait AlignmentSource: Send {
    /// Name used in log messages and errors
    fn name(&self) -> &str;

    fn reference_length(&self, ref_id: &str) -> Option<Pos>;

    fn query_overlapping(
        &mut self,
        ref_id: &str,
        from: Pos,
        to: Pos,
    ) -> anyhow::Result<RecordIter<'_>>;
}

impl<S: AlignmentSource + ?Sized> AlignmentSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn reference_length(&self, ref_id: &str) -> Option<Pos> {
        (**self).reference_length(ref_id)
    }

    fn query_overlapping(
        &mut self,
        ref_id: &str,
        from: Pos,
        to: Pos,
    ) -> anyhow::Result<RecordIter<'_>> {
        (**self).query_overlapping(ref_id, from, to)
    }
}

/// Records for one reference sequence
///
/// records - sorted on start once indexed
/// max_span - longest record, bounds how far back a query has to look
///
struct RefRecords {
    length: Pos,
    records: Vec<AlignmentRecord>,
    max_span: Pos,
    sorted: bool,
}

impl RefRecords {
    fn new(length: Pos) -> Self {
        Self {
            length,
            records: Vec::new(),
            max_span: 0,
            sorted: true,
        }
    }

    fn push(&mut self, rec: AlignmentRecord) {
        if let Some(last) = self.records.last() {
            if last.start > rec.start {
                self.sorted = false
            }
        }
        self.max_span = self.max_span.max(rec.stop.saturating_sub(rec.start) + 1);
        self.records.push(rec)
    }

    fn index(&mut self) {
        if !self.sorted {
            self.records.sort_by_key(|r| r.start);
            self.sorted = true
        }
    }

    fn overlapping(&self, from: Pos, to: Pos) -> impl Iterator<Item = &AlignmentRecord> + '_ {
        // No record starting before this can reach from
        let min_start = from.saturating_sub(self.max_span);
        let i = self.records.partition_point(|r| r.start < min_start);
        self.records[i..]
            .iter()
            .take_while(move |r| r.start <= to)
            .filter(move |r| r.stop >= from)
    }
}

/// MemorySource
///
/// Alignment source holding all records in memory, with a simple index
/// (records sorted on start plus the maximum record span per reference).
///
/// Reference names are shared with the records' owners, so Arc<str> is used
/// as the key
///
pub struct MemorySource {
    name: String,
    refs: HashMap<Arc<str>, RefRecords>,
    n_queries: usize,
}

impl MemorySource {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Self {
            name: name.as_ref().to_owned(),
            refs: HashMap::new(),
            n_queries: 0,
        }
    }

    /// Declare a reference.  Redeclaring an existing reference updates its length
    pub fn add_reference(&mut self, ref_id: &str, length: Pos) {
        match self.refs.get_mut(ref_id) {
            Some(r) => r.length = length,
            None => {
                self.refs.insert(Arc::from(ref_id), RefRecords::new(length));
            }
        }
    }

    /// Add a record.  Fails if the reference has not been declared
    pub fn push(&mut self, ref_id: &str, rec: AlignmentRecord) -> anyhow::Result<()> {
        let r = self
            .refs
            .get_mut(ref_id)
            .ok_or_else(|| anyhow!("Reference {} not declared", ref_id))?;
        r.push(rec);
        Ok(())
    }

    pub fn n_references(&self) -> usize {
        self.refs.len()
    }

    pub fn n_records(&self) -> usize {
        self.refs.values().map(|r| r.records.len()).sum()
    }

    /// Number of calls to query_overlapping() so far
    pub fn n_queries(&self) -> usize {
        self.n_queries
    }

    /// Sort records where required.  Called automatically by the first query
    pub fn index(&mut self) {
        for r in self.refs.values_mut() {
            r.index()
        }
    }
}

impl AlignmentSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn reference_length(&self, ref_id: &str) -> Option<Pos> {
        self.refs.get(ref_id).map(|r| r.length)
    }

    fn query_overlapping(
        &mut self,
        ref_id: &str,
        from: Pos,
        to: Pos,
    ) -> anyhow::Result<RecordIter<'_>> {
        self.n_queries += 1;
        let r = self
            .refs
            .get_mut(ref_id)
            .ok_or_else(|| anyhow!("Reference {} not found in {}", ref_id, self.name))?;
        r.index();
        trace!(
            "Query {}:{}-{} in {} ({} records)",
            ref_id,
            from,
            to,
            self.name,
            r.records.len()
        );
        let r = &*r;
        Ok(Box::new(
            r.overlapping(from, to).cloned().map(Ok::<_, anyhow::Error>),
        ))
    }
}
