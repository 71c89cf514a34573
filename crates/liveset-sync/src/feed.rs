//! Live feed collaborator interface
//!
//! A [`LiveFeed`] pushes record-level events for a query into a [`FeedSink`].
//! Sinks are stamped with the fetch generation that created them; events
//! arriving through a sink from a superseded generation are dropped.

use crate::batcher::CoordinatorHandle;
use crate::error::FeedError;
use liveset_core::Record;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Event pushed by a live feed
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Record now matches the query
    Added(Record),
    /// Record attributes changed
    Changed(Record),
    /// Record position changed at the source; handled as a change
    Moved(Record),
    /// Record no longer matches the query
    Removed(Record),
    /// The initial result load is complete; flushes without waiting
    InitialLoadComplete,
}

/// Fetch generation counter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Token returned by a feed for a live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    /// Create new random handle
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubscriptionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Delivery endpoint handed to a feed on subscribe
#[derive(Debug, Clone)]
pub struct FeedSink {
    generation: Generation,
    current: Arc<AtomicU64>,
    coordinator: CoordinatorHandle,
}

impl FeedSink {
    /// Create sink bound to a generation and coordinator
    #[must_use]
    pub fn new(generation: Generation, current: Arc<AtomicU64>, coordinator: CoordinatorHandle) -> Self {
        Self {
            generation,
            current,
            coordinator,
        }
    }

    /// Generation this sink was created for
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether this sink still belongs to the active fetch
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation.0
    }

    /// Deliver an event
    ///
    /// Returns `false` when the event was dropped, either because the sink
    /// is stale or the coordinator is gone.
    pub fn deliver(&self, event: FeedEvent) -> bool {
        if !self.is_current() {
            tracing::trace!(generation = %self.generation, "dropping event from stale generation");
            return false;
        }

        let result = match event {
            FeedEvent::Added(record) => self.coordinator.insert(record),
            FeedEvent::Changed(record) | FeedEvent::Moved(record) => self.coordinator.update(record),
            FeedEvent::Removed(record) => self.coordinator.remove(record),
            FeedEvent::InitialLoadComplete => self.coordinator.process_batch(),
        };

        if let Err(e) = result {
            tracing::debug!(generation = %self.generation, error = %e, "event not delivered");
            return false;
        }
        true
    }
}

/// Source of live record events for a query
#[async_trait::async_trait]
pub trait LiveFeed: Send + Sync + 'static {
    /// Query understood by this feed
    type Query: Send + Sync;

    /// Start pushing events for `query` into `sink`
    async fn subscribe(&self, query: &Self::Query, sink: FeedSink) -> Result<SubscriptionHandle, FeedError>;

    /// Stop a subscription; unknown handles are ignored
    async fn unsubscribe(&self, handle: SubscriptionHandle);
}
