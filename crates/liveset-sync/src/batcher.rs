//! Debounced batch coordination
//!
//! Feed events accumulate in a [`PendingBatch`] until the quiet window
//! elapses, then flush as one reconciled [`Batch`]. The coordinator runs as
//! a tokio task driven by a command channel:
//! - every event (re)arms the quiet-window deadline
//! - a forced flush bypasses the window
//! - each flush is bracketed by [`BatchEvent::Begin`] / [`BatchEvent::Finished`]

use crate::config::BatchConfig;
use crate::error::SyncError;
use indexmap::IndexMap;
use liveset_core::{Batch, Identity, Record};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// A single record-level change delivered to the coordinator
#[derive(Debug, Clone)]
pub enum Change {
    /// Record entered the source
    Insert(Record),
    /// Record attributes changed
    Update(Record),
    /// Record left the source
    Remove(Record),
}

/// Notifications emitted by the coordinator
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A batch started accumulating; sent once per batch
    Begin,
    /// The batch is closed and reconciled
    Finished(Batch),
}

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// No open batch
    Idle,
    /// Accumulating until the deadline
    Batching {
        /// Instant at which the batch flushes unless re-armed
        deadline: Instant,
    },
}

#[derive(Debug, Clone)]
struct Tagged {
    seq: u64,
    record: Record,
}

/// Accumulated, not yet flushed changes
///
/// Each identity appears in at most one of the insert and update sets once
/// [`PendingBatch::take`] reconciles them.
#[derive(Debug, Default)]
pub struct PendingBatch {
    inserted: IndexMap<Identity, Tagged>,
    updated: IndexMap<Identity, Tagged>,
    removed: IndexMap<Identity, Record>,
    seq: u64,
}

impl PendingBatch {
    /// Create empty batch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Record an insertion; repeated inserts keep the latest value
    pub fn insert(&mut self, record: Record) {
        let seq = self.next_seq();
        self.inserted
            .insert(record.identity().clone(), Tagged { seq, record });
    }

    /// Record an update; repeated updates keep the latest value
    pub fn update(&mut self, record: Record) {
        let seq = self.next_seq();
        self.updated
            .insert(record.identity().clone(), Tagged { seq, record });
    }

    /// Record a removal
    ///
    /// Removing a record first inserted in this same batch cancels both.
    pub fn remove(&mut self, record: Record) {
        let identity = record.identity().clone();
        self.updated.shift_remove(&identity);
        if self.inserted.shift_remove(&identity).is_some() && !self.removed.contains_key(&identity) {
            tracing::trace!(%identity, "insert cancelled by removal");
            return;
        }
        self.removed.insert(identity, record);
    }

    /// Whether nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Number of pending entries before reconciliation
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.removed.len()
    }

    /// Close the batch and reset to empty
    ///
    /// An identity both inserted and updated becomes a single insertion
    /// carrying whichever value arrived last.
    pub fn take(&mut self) -> Batch {
        let mut inserted = std::mem::take(&mut self.inserted);
        let updated = std::mem::take(&mut self.updated);
        let removed = std::mem::take(&mut self.removed);
        self.seq = 0;

        let mut batch = Batch::default();
        for (identity, update) in updated {
            match inserted.get_mut(&identity) {
                Some(insert) => {
                    if update.seq > insert.seq {
                        *insert = update;
                    }
                }
                None => batch.updated.push(update.record),
            }
        }
        batch.inserted = inserted.into_values().map(|t| t.record).collect();
        batch.removed = removed.into_values().collect();
        batch
    }
}

#[derive(Debug)]
enum Command {
    Change(Change),
    Flush,
}

/// Cloneable sender side of a running coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    /// Submit a change
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn submit(&self, change: Change) -> Result<(), SyncError> {
        self.send(Command::Change(change))
    }

    /// Submit an insertion
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn insert(&self, record: Record) -> Result<(), SyncError> {
        self.submit(Change::Insert(record))
    }

    /// Submit an update
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn update(&self, record: Record) -> Result<(), SyncError> {
        self.submit(Change::Update(record))
    }

    /// Submit a removal
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn remove(&self, record: Record) -> Result<(), SyncError> {
        self.submit(Change::Remove(record))
    }

    /// Flush now, bypassing the quiet window
    ///
    /// Also flushes when nothing is pending, producing an empty batch.
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn process_batch(&self) -> Result<(), SyncError> {
        self.send(Command::Flush)
    }

    /// Whether the coordinator task is still receiving
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::CoordinatorClosed)
    }
}

/// Owner of a running coordinator task
///
/// Dropping the coordinator aborts its task; pending changes are discarded.
#[derive(Debug)]
pub struct BatchCoordinator {
    handle: CoordinatorHandle,
    task: JoinHandle<()>,
}

impl BatchCoordinator {
    /// Spawn a coordinator on the current runtime
    ///
    /// Returns the coordinator and the receiver of its batch events.
    #[must_use]
    pub fn spawn(config: BatchConfig) -> (Self, mpsc::UnboundedReceiver<BatchEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();

        let actor = CoordinatorActor {
            config,
            pending: PendingBatch::new(),
            state: BatchState::Idle,
            events,
        };
        let task = tokio::spawn(actor.run(command_rx));

        tracing::debug!(
            quiet_window_ms = config.quiet_window.as_millis(),
            immediate = config.immediate,
            "batch coordinator started"
        );

        let coordinator = Self {
            handle: CoordinatorHandle { commands },
            task,
        };
        (coordinator, event_rx)
    }

    /// Sender handle for feed callbacks
    #[inline]
    #[must_use]
    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Submit an insertion
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn insert(&self, record: Record) -> Result<(), SyncError> {
        self.handle.insert(record)
    }

    /// Submit an update
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn update(&self, record: Record) -> Result<(), SyncError> {
        self.handle.update(record)
    }

    /// Submit a removal
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn remove(&self, record: Record) -> Result<(), SyncError> {
        self.handle.remove(record)
    }

    /// Flush now, bypassing the quiet window
    ///
    /// # Errors
    /// `CoordinatorClosed` once the coordinator task has stopped
    pub fn process_batch(&self) -> Result<(), SyncError> {
        self.handle.process_batch()
    }
}

impl Drop for BatchCoordinator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct CoordinatorActor {
    config: BatchConfig,
    pending: PendingBatch,
    state: BatchState,
    events: mpsc::UnboundedSender<BatchEvent>,
}

impl CoordinatorActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = match self.state {
                BatchState::Batching { deadline } => Some(deadline),
                BatchState::Idle => None,
            };

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Change(change)) => self.accept(change),
                    Some(Command::Flush) => self.flush(),
                    None => {
                        if matches!(self.state, BatchState::Batching { .. }) {
                            self.flush();
                        }
                        break;
                    }
                },
                () = wait_until(deadline) => self.flush(),
            }
        }
        tracing::debug!("batch coordinator stopped");
    }

    fn accept(&mut self, change: Change) {
        self.begin_if_idle();
        match change {
            Change::Insert(record) => self.pending.insert(record),
            Change::Update(record) => self.pending.update(record),
            Change::Remove(record) => self.pending.remove(record),
        }

        if self.config.immediate {
            self.flush();
        } else {
            self.state = BatchState::Batching {
                deadline: Instant::now() + self.config.quiet_window,
            };
        }
    }

    fn begin_if_idle(&mut self) {
        if self.state == BatchState::Idle {
            self.state = BatchState::Batching {
                deadline: Instant::now() + self.config.quiet_window,
            };
            self.emit(BatchEvent::Begin);
        }
    }

    fn flush(&mut self) {
        self.begin_if_idle();
        let batch = self.pending.take();
        self.state = BatchState::Idle;
        tracing::debug!(
            inserted = batch.inserted.len(),
            updated = batch.updated.len(),
            removed = batch.removed.len(),
            "batch flushed"
        );
        self.emit(BatchEvent::Finished(batch));
    }

    fn emit(&self, event: BatchEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("batch consumer dropped");
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
