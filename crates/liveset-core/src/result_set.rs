//! Ordered, sectioned result set with batched incremental apply
//!
//! A [`ResultSet`] owns the globally ordered record list and the section list
//! derived from it. Both are kept sorted by the [`OrderingSpec`]; identity is
//! unique across the set.
//!
//! # Invariants
//! - `records()` is exactly the concatenation of every section's records, in
//!   section-key order.
//! - No two records share an identity.
//! - Sections are never empty.

use crate::error::ResultSetError;
use crate::ordering::OrderingSpec;
use crate::record::{Identity, Record};
use crate::section::Section;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, OnceLock};

/// Record filter; records failing it are excluded from the set
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Section-relative coordinate of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexPath {
    /// Section index
    pub section: usize,
    /// Row within the section
    pub row: usize,
}

impl IndexPath {
    /// Create index path
    #[inline]
    #[must_use]
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

impl Display for IndexPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.row)
    }
}

/// Net changes to apply in one step
///
/// Produced by the batching layer; each list is keyed by identity with no
/// duplicates inside a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Newly inserted records (or re-inserts of existing identities)
    pub inserted: Vec<Record>,
    /// Records whose value changed
    pub updated: Vec<Record>,
    /// Records removed from the source
    pub removed: Vec<Record>,
}

impl Batch {
    /// Batch of inserts only
    #[inline]
    #[must_use]
    pub fn inserts(records: Vec<Record>) -> Self {
        Self {
            inserted: records,
            ..Self::default()
        }
    }

    /// Whether the batch carries no changes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of entries across all lists
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.removed.len()
    }

    /// Identities whose content changed in this batch
    #[must_use]
    pub fn changed_identities(&self) -> HashSet<Identity> {
        self.updated.iter().map(|r| r.identity().clone()).collect()
    }
}

/// Lazily built coordinate tables, dropped on every apply
#[derive(Debug, Clone, Default)]
struct Lookups(OnceLock<LookupTables>);

#[derive(Debug, Clone, Default)]
struct LookupTables {
    paths: HashMap<Identity, IndexPath>,
    section_offsets: Vec<usize>,
}

/// Ordered, sectioned set of records
#[derive(Clone)]
pub struct ResultSet {
    ordering: Arc<OrderingSpec>,
    predicate: Option<Predicate>,
    records: Vec<Record>,
    sections: Vec<Section>,
    by_identity: HashMap<Identity, Record>,
    lookups: Lookups,
}

impl ResultSet {
    /// Create empty result set
    #[must_use]
    pub fn new(ordering: OrderingSpec) -> Self {
        Self {
            ordering: Arc::new(ordering),
            predicate: None,
            records: Vec::new(),
            sections: Vec::new(),
            by_identity: HashMap::new(),
            lookups: Lookups::default(),
        }
    }

    /// With record filter
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Empty result set with the same ordering and predicate
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            ordering: Arc::clone(&self.ordering),
            predicate: self.predicate.clone(),
            records: Vec::new(),
            sections: Vec::new(),
            by_identity: HashMap::new(),
            lookups: Lookups::default(),
        }
    }

    /// Ordering specification
    #[inline]
    #[must_use]
    pub fn ordering(&self) -> &OrderingSpec {
        &self.ordering
    }

    /// Whether a value passes the predicate (always true without one)
    #[inline]
    #[must_use]
    pub fn admits(&self, value: &Value) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(value))
    }

    /// Apply a batch of changes
    ///
    /// Removals run first, then updates (remove + re-insert, since the section
    /// or sort position may have moved), then inserts. Inserting an identity
    /// already present replaces it. Unknown identities are ignored.
    pub fn apply(&mut self, batch: &Batch) {
        for record in &batch.removed {
            self.remove_identity(record.identity());
        }
        for record in batch.updated.iter().chain(&batch.inserted) {
            self.remove_identity(record.identity());
            self.insert_record(record.clone());
        }
        self.lookups = Lookups::default();

        tracing::trace!(
            inserted = batch.inserted.len(),
            updated = batch.updated.len(),
            removed = batch.removed.len(),
            records = self.records.len(),
            sections = self.sections.len(),
            "applied batch"
        );
    }

    fn remove_identity(&mut self, identity: &Identity) -> Option<Record> {
        let current = self.by_identity.remove(identity)?;
        let ordering = Arc::clone(&self.ordering);

        let key = ordering.section_key(current.value());
        let Ok(index) = self.sections.binary_search_by(|s| s.key().cmp(&*key)) else {
            return Some(current);
        };
        if let Some(row) = self.sections[index].remove(&current, &ordering) {
            // records mirrors the sections, so the global slot follows from the row
            self.records.remove(self.offset_of(index) + row);
        }
        if self.sections[index].is_empty() {
            self.sections.remove(index);
        }

        Some(current)
    }

    fn insert_record(&mut self, record: Record) {
        if !self.admits(record.value()) {
            return;
        }
        let ordering = Arc::clone(&self.ordering);

        let key = ordering.section_key(record.value()).into_owned();
        let index = match self.sections.binary_search_by(|s| s.key().cmp(key.as_str())) {
            Ok(index) => index,
            Err(index) => {
                self.sections.insert(index, Section::new(key));
                index
            }
        };
        let row = self.sections[index].insert(record.clone(), &ordering);
        let global = self.offset_of(index) + row;
        self.records.insert(global, record.clone());
        self.by_identity.insert(record.identity().clone(), record);
    }

    /// Global index of the first row of section `index`
    fn offset_of(&self, index: usize) -> usize {
        self.sections[..index].iter().map(Section::len).sum()
    }

    /// Records in global order (section-major)
    #[inline]
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Sections in key order
    #[inline]
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Section keys in order
    pub fn section_keys(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(Section::key)
    }

    /// Section at `index`
    ///
    /// # Errors
    /// `SectionOutOfRange` when `index` is beyond the section count
    pub fn section(&self, index: usize) -> Result<&Section, ResultSetError> {
        self.sections
            .get(index)
            .ok_or(ResultSetError::SectionOutOfRange {
                section: index,
                count: self.sections.len(),
            })
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set holds no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current record for `identity`
    #[inline]
    #[must_use]
    pub fn get(&self, identity: &Identity) -> Option<&Record> {
        self.by_identity.get(identity)
    }

    /// Whether `identity` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.by_identity.contains_key(identity)
    }

    /// Record at a section-relative coordinate
    ///
    /// # Errors
    /// `SectionOutOfRange` or `RowOutOfRange` when either index exceeds the
    /// current bounds
    pub fn record_at(&self, path: IndexPath) -> Result<&Record, ResultSetError> {
        let section = self.section(path.section)?;
        section.get(path.row).ok_or(ResultSetError::RowOutOfRange {
            section: path.section,
            row: path.row,
            count: section.len(),
        })
    }

    /// Coordinate of the record with `identity`
    #[must_use]
    pub fn index_path_of(&self, identity: &Identity) -> Option<IndexPath> {
        self.tables().paths.get(identity).copied()
    }

    /// Index of the section holding `identity`
    #[must_use]
    pub fn section_index_of(&self, identity: &Identity) -> Option<usize> {
        self.index_path_of(identity).map(|path| path.section)
    }

    /// Global index of the first row in the section holding `identity`
    #[must_use]
    pub fn section_offset_of(&self, identity: &Identity) -> Option<usize> {
        let section = self.section_index_of(identity)?;
        self.tables().section_offsets.get(section).copied()
    }

    /// Convert a global record index into a section-relative coordinate
    #[must_use]
    pub fn index_path_at(&self, global: usize) -> Option<IndexPath> {
        let record = self.records.get(global)?;
        let section = self.section_index_of(record.identity())?;
        let offset = self.tables().section_offsets[section];
        Some(IndexPath::new(section, global - offset))
    }

    fn tables(&self) -> &LookupTables {
        self.lookups.0.get_or_init(|| {
            let mut tables = LookupTables {
                paths: HashMap::with_capacity(self.records.len()),
                section_offsets: Vec::with_capacity(self.sections.len()),
            };
            let mut offset = 0;
            for (section_index, section) in self.sections.iter().enumerate() {
                tables.section_offsets.push(offset);
                for (row, record) in section.records().iter().enumerate() {
                    tables
                        .paths
                        .insert(record.identity().clone(), IndexPath::new(section_index, row));
                }
                offset += section.len();
            }
            tables
        })
    }
}

impl Debug for ResultSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("ordering", &self.ordering)
            .field("has_predicate", &self.predicate.is_some())
            .field("records", &self.records.len())
            .field("sections", &self.sections.len())
            .finish()
    }
}
