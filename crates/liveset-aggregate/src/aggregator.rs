//! Merged view over several member result sets
//!
//! Members report through a [`MemberDelegate`]. The aggregator counts open
//! member transitions; the consumer sees one `will_change_content` when the
//! first opens, and when the last one closes it receives every buffered
//! member script in member order, shifted into aggregate coordinates,
//! followed by one `did_change_content`.
//!
//! Buffered scripts are replayed one after another, so each is shifted by
//! the section counts its preceding members have after their own replays.

use crate::error::AggregateError;
use liveset_core::{ChangeScript, IndexPath, Record};
use liveset_sync::{flatten, ResultSetDelegate, RowChangeKind, SectionChangeKind};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Member of an aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(usize);

impl Display for MemberId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

/// Consumer of the merged view
///
/// Coordinates are aggregate coordinates. Within one transition the
/// per-member callbacks arrive in member order, each member's section and
/// row callbacks followed by its [`did_change_member`](Self::did_change_member).
pub trait AggregateDelegate: Send + Sync {
    /// First member started a transition
    fn will_change_content(&self) {}

    /// A section was inserted or deleted
    fn did_change_section(&self, _member: MemberId, _key: &str, _index: usize, _kind: SectionChangeKind) {}

    /// A row was inserted, deleted, moved, or updated
    fn did_change_row(
        &self,
        _member: MemberId,
        _record: &Record,
        _from: Option<IndexPath>,
        _to: Option<IndexPath>,
        _kind: RowChangeKind,
    ) {
    }

    /// One member script, shifted into aggregate coordinates
    fn did_change_member(&self, _member: MemberId, _script: &ChangeScript) {}

    /// Last open member transition finished
    fn did_change_content(&self) {}
}

#[derive(Debug)]
struct Slot {
    id: MemberId,
    sections: usize,
}

#[derive(Debug, Default)]
struct State {
    slots: Vec<Slot>,
    extra: Option<MemberId>,
    next_id: usize,
    open: HashSet<MemberId>,
    buffered: Vec<(MemberId, ChangeScript)>,
}

impl State {
    fn attach(&mut self, extra: bool) -> MemberId {
        let id = MemberId(self.next_id);
        self.next_id += 1;
        let slot = Slot { id, sections: 0 };
        // the extra member stays last
        if extra || self.extra.is_none() {
            self.slots.push(slot);
        } else {
            let at = self.slots.len() - 1;
            self.slots.insert(at, slot);
        }
        if extra {
            self.extra = Some(id);
        }
        id
    }

    fn position(&self, id: MemberId) -> Result<usize, AggregateError> {
        self.slots
            .iter()
            .position(|s| s.id == id)
            .ok_or(AggregateError::UnknownMember(id))
    }

    fn offset(&self, position: usize) -> usize {
        self.slots[..position].iter().map(|s| s.sections).sum()
    }

    fn section_count(&self) -> usize {
        self.slots.iter().map(|s| s.sections).sum()
    }

    /// Shift and apply buffered scripts in member order
    fn release(&mut self) -> Vec<(MemberId, ChangeScript)> {
        let mut buffered = std::mem::take(&mut self.buffered);
        buffered.sort_by_key(|(id, _)| self.slots.iter().position(|s| s.id == *id));

        let mut released = Vec::with_capacity(buffered.len());
        for (id, script) in buffered {
            let Ok(position) = self.position(id) else {
                continue;
            };
            let shifted = script.shifted(self.offset(position));
            self.slots[position].sections = script.sections_after;
            released.push((id, shifted));
        }
        released
    }
}

/// Merges member result sets into one sectioned view
#[derive(Clone)]
pub struct ResultAggregator {
    state: Arc<Mutex<State>>,
    delivery: Arc<Mutex<()>>,
    consumer: Arc<dyn AggregateDelegate>,
}

impl ResultAggregator {
    /// Create aggregator reporting to `consumer`
    #[must_use]
    pub fn new(consumer: Arc<dyn AggregateDelegate>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            delivery: Arc::new(Mutex::new(())),
            consumer,
        }
    }

    /// Attach a member after every existing regular member
    ///
    /// The member starts with zero sections, so attach before its result
    /// set is fetched.
    #[must_use]
    pub fn attach(&self) -> MemberDelegate {
        let id = self.state.lock().attach(false);
        tracing::debug!(member = %id, "member attached");
        self.member(id)
    }

    /// Attach the extra member, which always sorts after every other member
    ///
    /// # Errors
    /// `ExtraAlreadyAttached` when an extra member already exists
    pub fn attach_extra(&self) -> Result<MemberDelegate, AggregateError> {
        let id = {
            let mut state = self.state.lock();
            if state.extra.is_some() {
                return Err(AggregateError::ExtraAlreadyAttached);
            }
            state.attach(true)
        };
        tracing::debug!(member = %id, "extra member attached");
        Ok(self.member(id))
    }

    fn member(&self, id: MemberId) -> MemberDelegate {
        MemberDelegate {
            id,
            aggregator: self.clone(),
        }
    }

    /// Members in aggregate order
    #[must_use]
    pub fn members(&self) -> Vec<MemberId> {
        self.state.lock().slots.iter().map(|s| s.id).collect()
    }

    /// Total sections across members, as last reported to the consumer
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.state.lock().section_count()
    }

    /// Sections of one member
    ///
    /// # Errors
    /// `UnknownMember` when `member` is not attached
    pub fn member_section_count(&self, member: MemberId) -> Result<usize, AggregateError> {
        let state = self.state.lock();
        let position = state.position(member)?;
        Ok(state.slots[position].sections)
    }

    /// Member owning an aggregate section, and the member-local section
    ///
    /// # Errors
    /// `SectionOutOfRange` when `section` is beyond the aggregate count
    pub fn locate(&self, section: usize) -> Result<(MemberId, usize), AggregateError> {
        let state = self.state.lock();
        let mut local = section;
        for slot in &state.slots {
            if local < slot.sections {
                return Ok((slot.id, local));
            }
            local -= slot.sections;
        }
        Err(AggregateError::SectionOutOfRange {
            section,
            count: state.section_count(),
        })
    }

    /// Aggregate section of a member-local section
    ///
    /// # Errors
    /// `UnknownMember` when `member` is not attached, `SectionOutOfRange` when
    /// `local` is beyond its section count
    pub fn global_section(&self, member: MemberId, local: usize) -> Result<usize, AggregateError> {
        let state = self.state.lock();
        let position = state.position(member)?;
        let count = state.slots[position].sections;
        if local >= count {
            return Err(AggregateError::SectionOutOfRange { section: local, count });
        }
        Ok(state.offset(position) + local)
    }

    /// Aggregate coordinate of a member-local index path
    ///
    /// # Errors
    /// `UnknownMember` when `member` is not attached, `SectionOutOfRange` when
    /// the section is beyond its section count
    pub fn global_path(&self, member: MemberId, path: IndexPath) -> Result<IndexPath, AggregateError> {
        let section = self.global_section(member, path.section)?;
        Ok(IndexPath::new(section, path.row))
    }

    /// Whether any member transition is open
    #[must_use]
    pub fn is_changing(&self) -> bool {
        !self.state.lock().open.is_empty()
    }

    fn begin(&self, id: MemberId) {
        let _delivery = self.delivery.lock();
        self.open(id);
    }

    fn open(&self, id: MemberId) {
        let first = {
            let mut state = self.state.lock();
            state.open.insert(id) && state.open.len() == 1
        };
        if first {
            self.consumer.will_change_content();
        }
    }

    fn finish(&self, id: MemberId, script: &ChangeScript) {
        let _delivery = self.delivery.lock();

        let opened = self.state.lock().open.contains(&id);
        if !opened {
            tracing::warn!(member = %id, "change finished without start");
            self.open(id);
        }

        let released = {
            let mut state = self.state.lock();
            state.open.remove(&id);
            state.buffered.push((id, script.clone()));
            if state.open.is_empty() {
                Some(state.release())
            } else {
                None
            }
        };

        let Some(released) = released else {
            tracing::trace!(member = %id, "member script buffered");
            return;
        };

        for (member, script) in &released {
            flatten(
                script,
                |key, index, kind| self.consumer.did_change_section(*member, key, index, kind),
                |record, from, to, kind| self.consumer.did_change_row(*member, record, from, to, kind),
            );
            self.consumer.did_change_member(*member, script);
        }
        self.consumer.did_change_content();
        tracing::debug!(members = released.len(), "aggregate transition complete");
    }
}

/// Delegate handed to one member's controller
#[derive(Clone)]
pub struct MemberDelegate {
    id: MemberId,
    aggregator: ResultAggregator,
}

impl MemberDelegate {
    /// Member this delegate reports for
    #[inline]
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }
}

impl ResultSetDelegate for MemberDelegate {
    fn will_change_content(&self) {
        self.aggregator.begin(self.id);
    }

    fn did_change_content(&self, script: &ChangeScript) {
        self.aggregator.finish(self.id, script);
    }
}
