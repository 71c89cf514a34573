//! Fetch lifecycle for one live result set
//!
//! [`LiveResultsController`] owns the current [`ResultSet`], the batch
//! coordinator feeding it, and the live feed subscription. Each
//! [`perform_fetch`](LiveResultsController::perform_fetch) starts a new
//! generation; everything belonging to an older generation is discarded.
//!
//! Per finished batch the pump task:
//! 1. clones the current set and applies the batch to the clone
//! 2. diffs the two snapshots
//! 3. swaps the clone in
//! 4. reports the change script to the delegate
//!
//! Every delegate callback of one controller runs under a single delivery
//! lock, so a restart never interleaves its clearing transition with a batch
//! an aborted pump is still reporting.

use crate::batcher::{BatchCoordinator, BatchEvent};
use crate::config::BatchConfig;
use crate::delegate::{deliver_script, ResultSetDelegate};
use crate::error::SyncError;
use crate::feed::{FeedSink, Generation, LiveFeed, SubscriptionHandle};
use liveset_core::{diff, ChangeScript, Identity, IndexPath, OrderingSpec, Record, ResultSet, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct ActiveFetch {
    generation: Generation,
    subscription: SubscriptionHandle,
    coordinator: BatchCoordinator,
    pump: JoinHandle<()>,
}

impl ActiveFetch {
    fn discard(self) -> SubscriptionHandle {
        self.pump.abort();
        drop(self.coordinator);
        self.subscription
    }
}

/// Keeps a result set in sync with a live feed
pub struct LiveResultsController<F: LiveFeed> {
    feed: Arc<F>,
    config: BatchConfig,
    delegate: Arc<dyn ResultSetDelegate>,
    generation: Arc<AtomicU64>,
    results: Arc<RwLock<ResultSet>>,
    in_transition: Arc<AtomicBool>,
    delivery: Arc<Mutex<()>>,
    active: Mutex<Option<ActiveFetch>>,
}

impl<F: LiveFeed> LiveResultsController<F> {
    /// Create controller; nothing is fetched until `perform_fetch`
    #[must_use]
    pub fn new(feed: Arc<F>, ordering: OrderingSpec, delegate: Arc<dyn ResultSetDelegate>) -> Self {
        let results = ResultSet::new(ordering);
        Self {
            feed,
            config: BatchConfig::default(),
            delegate,
            generation: Arc::new(AtomicU64::new(0)),
            results: Arc::new(RwLock::new(results)),
            in_transition: Arc::new(AtomicBool::new(false)),
            delivery: Arc::new(Mutex::new(())),
            active: Mutex::new(None),
        }
    }

    /// With batching configuration; applies from the next fetch
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// With record filter
    #[must_use]
    pub fn with_predicate<P>(self, predicate: P) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        {
            let mut results = self.results.write();
            *results = results.empty_like().with_predicate(predicate);
        }
        self
    }

    /// Start (or restart) fetching `query`
    ///
    /// A restart unsubscribes the previous feed and discards its coordinator
    /// before anything new is created. Rows the consumer still shows from
    /// the previous fetch are removed through a regular transition.
    ///
    /// # Errors
    /// `Subscribe` when the feed refuses the subscription; the controller is
    /// then left not fetching
    pub async fn perform_fetch(&self, query: &F::Query) -> Result<(), SyncError> {
        let generation = Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
        self.teardown().await;
        self.clear_results();

        let (coordinator, events) = BatchCoordinator::spawn(self.config);
        let sink = FeedSink::new(generation, Arc::clone(&self.generation), coordinator.handle());

        let pump = tokio::spawn(pump(
            events,
            generation,
            Arc::clone(&self.generation),
            Arc::clone(&self.results),
            Arc::clone(&self.in_transition),
            Arc::clone(&self.delivery),
            Arc::clone(&self.delegate),
        ));

        let subscription = match self.feed.subscribe(query, sink).await {
            Ok(subscription) => subscription,
            Err(e) => {
                pump.abort();
                tracing::warn!(%generation, error = %e, "subscribe failed");
                return Err(e.into());
            }
        };

        let superseded = {
            let mut active = self.active.lock();
            if self.generation.load(Ordering::SeqCst) == generation.0 {
                *active = Some(ActiveFetch {
                    generation,
                    subscription,
                    coordinator,
                    pump,
                });
                false
            } else {
                pump.abort();
                true
            }
        };
        if superseded {
            // a newer fetch started while we were subscribing
            self.feed.unsubscribe(subscription).await;
            return Ok(());
        }

        tracing::info!(%generation, %subscription, "fetch started");
        Ok(())
    }

    /// Stop the current fetch; the result set keeps its contents
    pub async fn stop(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.teardown().await;
        self.close_transition(&ChangeScript::default());
        tracing::info!(generation, "fetch stopped");
    }

    /// Flush the pending batch now
    ///
    /// # Errors
    /// `NotFetching` without an active fetch, `CoordinatorClosed` when the
    /// coordinator has already shut down
    pub fn process_batch(&self) -> Result<(), SyncError> {
        let active = self.active.lock();
        let active = active.as_ref().ok_or(SyncError::NotFetching)?;
        active.coordinator.process_batch()
    }

    /// Whether a fetch is running
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Current fetch generation
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }

    /// Copy of the current result set
    #[must_use]
    pub fn snapshot(&self) -> ResultSet {
        self.results.read().clone()
    }

    /// Number of sections
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.results.read().sections().len()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    /// Whether the result set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }

    /// Record at a coordinate
    ///
    /// # Errors
    /// `Lookup` when the section or row is out of range
    pub fn record_at(&self, path: IndexPath) -> Result<Record, SyncError> {
        Ok(self.results.read().record_at(path)?.clone())
    }

    /// Coordinate of an identity
    #[must_use]
    pub fn index_path_of(&self, identity: &Identity) -> Option<IndexPath> {
        self.results.read().index_path_of(identity)
    }

    async fn teardown(&self) {
        let previous = self.active.lock().take();
        if let Some(previous) = previous {
            let generation = previous.generation;
            let subscription = previous.discard();
            self.feed.unsubscribe(subscription).await;
            tracing::debug!(%generation, %subscription, "previous fetch discarded");
        }
    }

    fn clear_results(&self) {
        let _delivery = self.delivery.lock();
        let (before, empty) = {
            let mut guard = self.results.write();
            let empty = guard.empty_like();
            (std::mem::replace(&mut *guard, empty.clone()), empty)
        };
        if before.is_empty() {
            self.close_open_transition(&ChangeScript::default());
            return;
        }

        let script = diff(&before, &empty, &HashSet::new());
        if !self.in_transition.swap(false, Ordering::SeqCst) {
            self.delegate.will_change_content();
        }
        deliver_script(&*self.delegate, &script);
    }

    /// Balance a `will_change_content` left open by a discarded batch
    fn close_transition(&self, script: &ChangeScript) {
        let _delivery = self.delivery.lock();
        self.close_open_transition(script);
    }

    fn close_open_transition(&self, script: &ChangeScript) {
        if self.in_transition.swap(false, Ordering::SeqCst) {
            deliver_script(&*self.delegate, script);
        }
    }
}

impl<F: LiveFeed> Drop for LiveResultsController<F> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some(active) = self.active.get_mut().take() else {
            return;
        };
        let subscription = active.discard();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let feed = Arc::clone(&self.feed);
                runtime.spawn(async move {
                    feed.unsubscribe(subscription).await;
                    tracing::debug!(%subscription, "subscription released on drop");
                });
            }
            Err(_) => tracing::warn!(%subscription, "dropped outside a runtime; subscription not released"),
        }
    }
}

async fn pump(
    mut events: mpsc::UnboundedReceiver<BatchEvent>,
    generation: Generation,
    current: Arc<AtomicU64>,
    results: Arc<RwLock<ResultSet>>,
    in_transition: Arc<AtomicBool>,
    delivery: Arc<Mutex<()>>,
    delegate: Arc<dyn ResultSetDelegate>,
) {
    let is_current = || current.load(Ordering::SeqCst) == generation.0;

    while let Some(event) = events.recv().await {
        if !is_current() {
            break;
        }

        // abort only lands at an await, so staleness is rechecked under the lock
        let _delivery = delivery.lock();
        if !is_current() {
            break;
        }

        match event {
            BatchEvent::Begin => {
                in_transition.store(true, Ordering::SeqCst);
                delegate.will_change_content();
            }
            BatchEvent::Finished(batch) => {
                let script = {
                    let mut guard = results.write();
                    // checked under the lock so a restart never sees a late swap
                    if !is_current() {
                        break;
                    }
                    let mut after = guard.clone();
                    after.apply(&batch);
                    let script = diff(&guard, &after, &batch.changed_identities());
                    *guard = after;
                    script
                };

                tracing::debug!(%generation, changes = script.len(), "batch applied");
                deliver_script(&*delegate, &script);
                in_transition.store(false, Ordering::SeqCst);
            }
        }
    }
    tracing::trace!(%generation, "batch pump stopped");
}
