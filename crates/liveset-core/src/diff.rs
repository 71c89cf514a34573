//! Diff engine: classified change scripts between two result set snapshots
//!
//! # Algorithm
//! 1. Edit script over section keys → section inserts/removes.
//! 2. Edit script over record identities (global order) → row inserts/removes.
//! 3. An identity both removed and inserted within the same section key
//!    becomes a move. Crossing into another section stays a removal plus an
//!    insert.
//! 4. Global positions are translated into section-relative [`IndexPath`]s
//!    against the snapshot they belong to.
//! 5. Changed identities present on both sides that took no part in step 2
//!    become updates, addressed in `before`.
//!
//! # Application order
//! Consumers must apply a script in the order produced by
//! [`ChangeScript::steps`]: updates, row removals, section removals, section
//! inserts, row inserts, moves. Removals address `before`, inserts address
//! `after`, moves go from `before` to `after`.

use crate::error::ResultSetError;
use crate::record::{Identity, Record};
use crate::result_set::{IndexPath, ResultSet};
use crate::sequence;
use std::collections::{HashMap, HashSet};

/// Section inserted or removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionChange {
    /// Section key
    pub key: String,
    /// Section index (in `before` for removals, in `after` for inserts)
    pub index: usize,
}

/// Row inserted, removed or updated
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    /// The record (as in `before` for removals, as in `after` otherwise)
    pub record: Record,
    /// Coordinate (in `before` for removals and updates, in `after` for inserts)
    pub path: IndexPath,
}

/// Row moved from a `before` coordinate to an `after` coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct RowMove {
    /// The record as in `after`
    pub record: Record,
    /// Coordinate in `before`
    pub from: IndexPath,
    /// Coordinate in `after`
    pub to: IndexPath,
}

/// Classified differences between two result set snapshots
///
/// Every list is sorted ascending by coordinate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeScript {
    /// Sections present only in `before`
    pub removed_sections: Vec<SectionChange>,
    /// Sections present only in `after`
    pub inserted_sections: Vec<SectionChange>,
    /// Rows present only in `before`
    pub removed_rows: Vec<RowChange>,
    /// Rows present only in `after`
    pub inserted_rows: Vec<RowChange>,
    /// Rows that left their place in the common subsequence
    pub moved_rows: Vec<RowMove>,
    /// Rows whose content changed in place
    pub updated_rows: Vec<RowChange>,
    /// Section count of `before`
    pub sections_before: usize,
    /// Section count of `after`
    pub sections_after: usize,
}

/// One entry of a change script, in application order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeStep<'a> {
    /// Content update at a `before` coordinate
    UpdateRow(&'a RowChange),
    /// Row removal at a `before` coordinate
    RemoveRow(&'a RowChange),
    /// Section removal at a `before` index
    RemoveSection(&'a SectionChange),
    /// Section insert at an `after` index
    InsertSection(&'a SectionChange),
    /// Row insert at an `after` coordinate
    InsertRow(&'a RowChange),
    /// Row move
    MoveRow(&'a RowMove),
}

impl ChangeScript {
    /// Whether the two snapshots were identical
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed_sections.is_empty()
            && self.inserted_sections.is_empty()
            && self.removed_rows.is_empty()
            && self.inserted_rows.is_empty()
            && self.moved_rows.is_empty()
            && self.updated_rows.is_empty()
    }

    /// Total number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.removed_sections.len()
            + self.inserted_sections.len()
            + self.removed_rows.len()
            + self.inserted_rows.len()
            + self.moved_rows.len()
            + self.updated_rows.len()
    }

    /// Entries in application order
    ///
    /// Removals come out highest coordinate first so each one leaves the
    /// coordinates of the next still valid.
    pub fn steps(&self) -> impl Iterator<Item = ChangeStep<'_>> {
        self.updated_rows
            .iter()
            .map(ChangeStep::UpdateRow)
            .chain(self.removed_rows.iter().rev().map(ChangeStep::RemoveRow))
            .chain(
                self.removed_sections
                    .iter()
                    .rev()
                    .map(ChangeStep::RemoveSection),
            )
            .chain(self.inserted_sections.iter().map(ChangeStep::InsertSection))
            .chain(self.inserted_rows.iter().map(ChangeStep::InsertRow))
            .chain(self.moved_rows.iter().map(ChangeStep::MoveRow))
    }
}

impl ChangeScript {
    /// Same script with every section coordinate shifted by `offset`
    ///
    /// Used to embed a script into a larger view where `offset` sections
    /// precede this one's.
    #[must_use]
    pub fn shifted(&self, offset: usize) -> Self {
        let section = |change: &SectionChange| SectionChange {
            key: change.key.clone(),
            index: change.index + offset,
        };
        let path = |p: IndexPath| IndexPath::new(p.section + offset, p.row);
        let row = |change: &RowChange| RowChange {
            record: change.record.clone(),
            path: path(change.path),
        };

        Self {
            removed_sections: self.removed_sections.iter().map(section).collect(),
            inserted_sections: self.inserted_sections.iter().map(section).collect(),
            removed_rows: self.removed_rows.iter().map(row).collect(),
            inserted_rows: self.inserted_rows.iter().map(row).collect(),
            moved_rows: self
                .moved_rows
                .iter()
                .map(|m| RowMove {
                    record: m.record.clone(),
                    from: path(m.from),
                    to: path(m.to),
                })
                .collect(),
            updated_rows: self.updated_rows.iter().map(row).collect(),
            sections_before: self.sections_before + offset,
            sections_after: self.sections_after + offset,
        }
    }
}

/// Compute the change script turning `before` into `after`
///
/// `changed` names the identities whose content changed in the batch that
/// produced `after`. A changed identity that was also removed, inserted or
/// moved is reported structurally and never as an update.
#[must_use]
pub fn diff(before: &ResultSet, after: &ResultSet, changed: &HashSet<Identity>) -> ChangeScript {
    let mut script = ChangeScript {
        sections_before: before.sections().len(),
        sections_after: after.sections().len(),
        ..ChangeScript::default()
    };

    let old_keys: Vec<&str> = before.section_keys().collect();
    let new_keys: Vec<&str> = after.section_keys().collect();
    let sections = sequence::diff(&old_keys, &new_keys);
    script.removed_sections = sections
        .deletions
        .iter()
        .map(|&index| SectionChange {
            key: old_keys[index].to_string(),
            index,
        })
        .collect();
    script.inserted_sections = sections
        .insertions
        .iter()
        .map(|&index| SectionChange {
            key: new_keys[index].to_string(),
            index,
        })
        .collect();

    // a row only matches its counterpart inside the same section
    let old_rows = keyed_rows(before);
    let new_rows = keyed_rows(after);
    let rows = sequence::diff(&old_rows, &new_rows);

    let deleted: HashSet<&Identity> = rows.deletions.iter().map(|&global| old_rows[global].1).collect();
    let mut removed: HashMap<&Identity, usize> = rows
        .deletions
        .iter()
        .map(|&global| (old_rows[global].1, global))
        .collect();

    for &global in &rows.insertions {
        let record = &after.records()[global];
        let Some(to) = after.index_path_at(global) else {
            continue;
        };
        let from = removed
            .get(record.identity())
            .and_then(|&old_global| before.index_path_at(old_global));
        if let Some(from) = from {
            if same_section(before, after, from, to) {
                removed.remove(record.identity());
                script.moved_rows.push(RowMove {
                    record: record.clone(),
                    from,
                    to,
                });
                continue;
            }
        }
        script.inserted_rows.push(RowChange {
            record: record.clone(),
            path: to,
        });
    }

    for &global in &rows.deletions {
        let record = &before.records()[global];
        if !removed.contains_key(record.identity()) {
            continue;
        }
        if let Some(path) = before.index_path_at(global) {
            script.removed_rows.push(RowChange {
                record: record.clone(),
                path,
            });
        }
    }

    for identity in changed {
        if deleted.contains(identity) {
            continue;
        }
        let (Some(path), Some(record)) = (before.index_path_of(identity), after.get(identity))
        else {
            continue;
        };
        script.updated_rows.push(RowChange {
            record: record.clone(),
            path,
        });
    }
    script.updated_rows.sort_by_key(|change| change.path);

    tracing::debug!(
        removed_sections = script.removed_sections.len(),
        inserted_sections = script.inserted_sections.len(),
        removed_rows = script.removed_rows.len(),
        inserted_rows = script.inserted_rows.len(),
        moved_rows = script.moved_rows.len(),
        updated_rows = script.updated_rows.len(),
        "computed change script"
    );

    script
}

fn keyed_rows(set: &ResultSet) -> Vec<(&str, &Identity)> {
    set.sections()
        .iter()
        .flat_map(|section| {
            section
                .records()
                .iter()
                .map(move |record| (section.key(), record.identity()))
        })
        .collect()
}

fn same_section(before: &ResultSet, after: &ResultSet, from: IndexPath, to: IndexPath) -> bool {
    match (before.sections().get(from.section), after.sections().get(to.section)) {
        (Some(old), Some(new)) => old.key() == new.key(),
        _ => false,
    }
}

/// Section key and row identities of a view, without record values
///
/// Lets a consumer mirror a result set by replaying change scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionLayout {
    sections: Vec<LayoutSection>,
}

/// One section of a [`SectionLayout`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSection {
    /// Section key
    pub key: String,
    /// Row identities in order
    pub rows: Vec<Identity>,
}

impl SectionLayout {
    /// Capture the layout of a result set
    #[must_use]
    pub fn from_result_set(set: &ResultSet) -> Self {
        Self {
            sections: set
                .sections()
                .iter()
                .map(|section| LayoutSection {
                    key: section.key().to_string(),
                    rows: section
                        .records()
                        .iter()
                        .map(|r| r.identity().clone())
                        .collect(),
                })
                .collect(),
        }
    }

    /// Layouts placed one after another
    #[must_use]
    pub fn concat<'a>(layouts: impl IntoIterator<Item = &'a SectionLayout>) -> Self {
        Self {
            sections: layouts
                .into_iter()
                .flat_map(|layout| layout.sections.iter().cloned())
                .collect(),
        }
    }

    /// Sections in order
    #[inline]
    #[must_use]
    pub fn sections(&self) -> &[LayoutSection] {
        &self.sections
    }

    /// Row identities in global order
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.sections.iter().flat_map(|s| s.rows.iter())
    }

    /// Replay a change script onto this layout
    ///
    /// Updates do not move rows and are skipped. Moves are replayed as a
    /// removal at `from` plus an insert at `to`.
    ///
    /// # Errors
    /// Returns the first coordinate that does not address this layout; the
    /// layout may be partially modified at that point.
    pub fn apply(&mut self, script: &ChangeScript) -> Result<(), ResultSetError> {
        let mut removals: Vec<IndexPath> = script
            .removed_rows
            .iter()
            .map(|change| change.path)
            .chain(script.moved_rows.iter().map(|change| change.from))
            .collect();
        removals.sort_unstable_by(|a, b| b.cmp(a));
        for path in removals {
            let section = self.section_mut(path.section)?;
            if path.row >= section.rows.len() {
                return Err(ResultSetError::RowOutOfRange {
                    section: path.section,
                    row: path.row,
                    count: section.rows.len(),
                });
            }
            section.rows.remove(path.row);
        }

        for change in script.removed_sections.iter().rev() {
            if change.index >= self.sections.len() {
                return Err(ResultSetError::SectionOutOfRange {
                    section: change.index,
                    count: self.sections.len(),
                });
            }
            self.sections.remove(change.index);
        }

        for change in &script.inserted_sections {
            if change.index > self.sections.len() {
                return Err(ResultSetError::SectionOutOfRange {
                    section: change.index,
                    count: self.sections.len(),
                });
            }
            self.sections.insert(
                change.index,
                LayoutSection {
                    key: change.key.clone(),
                    rows: Vec::new(),
                },
            );
        }

        let mut inserts: Vec<(IndexPath, &Identity)> = script
            .inserted_rows
            .iter()
            .map(|change| (change.path, change.record.identity()))
            .chain(
                script
                    .moved_rows
                    .iter()
                    .map(|change| (change.to, change.record.identity())),
            )
            .collect();
        inserts.sort_unstable_by_key(|(path, _)| *path);
        for (path, identity) in inserts {
            let section = self.section_mut(path.section)?;
            if path.row > section.rows.len() {
                return Err(ResultSetError::RowOutOfRange {
                    section: path.section,
                    row: path.row,
                    count: section.rows.len(),
                });
            }
            section.rows.insert(path.row, identity.clone());
        }

        Ok(())
    }

    fn section_mut(&mut self, index: usize) -> Result<&mut LayoutSection, ResultSetError> {
        let count = self.sections.len();
        self.sections
            .get_mut(index)
            .ok_or(ResultSetError::SectionOutOfRange {
                section: index,
                count,
            })
    }
}
