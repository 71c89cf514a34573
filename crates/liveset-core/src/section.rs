//! Sections: ordered buckets of records sharing one section key

use crate::ordering::OrderingSpec;
use crate::record::{Identity, Record};

/// Ordered bucket of records sharing one section key
///
/// Records are kept sorted by [`OrderingSpec::compare_in_section`]. A section
/// is never empty while it belongs to a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    key: String,
    records: Vec<Record>,
}

impl Section {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            records: Vec::new(),
        }
    }

    /// Section key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Records in section order
    #[inline]
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the section holds no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `row`
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize) -> Option<&Record> {
        self.records.get(row)
    }

    /// Row of the record with `identity` (linear scan)
    #[must_use]
    pub fn position(&self, identity: &Identity) -> Option<usize> {
        self.records.iter().position(|r| r.identity() == identity)
    }

    /// Insert in sorted position, returning the row it landed at
    pub(crate) fn insert(&mut self, record: Record, ordering: &OrderingSpec) -> usize {
        let row = self
            .records
            .partition_point(|existing| ordering.compare_in_section(existing, &record).is_lt());
        self.records.insert(row, record);
        row
    }

    /// Remove the entry equal in sort position to `current`, returning its row
    ///
    /// `current` must be the record as it is stored (same value), since the
    /// binary search runs on its sort key. Missing comparator fields make the
    /// order non-transitive, so a failed search falls back to a scan.
    pub(crate) fn remove(&mut self, current: &Record, ordering: &OrderingSpec) -> Option<usize> {
        let row = self
            .records
            .binary_search_by(|existing| ordering.compare_in_section(existing, current))
            .ok()
            .filter(|&row| self.records[row].identity() == current.identity())
            .or_else(|| self.position(current.identity()))?;
        self.records.remove(row);
        Some(row)
    }
}
