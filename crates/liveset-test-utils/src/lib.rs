//! Testing utilities for liveset workspace
//!
//! Shared record builders, an in-memory live feed, and a recording delegate.

#![allow(missing_docs)]

use liveset_core::{ChangeScript, IndexPath, OrderingSpec, Record, Value};
use liveset_sync::{
    FeedError, FeedEvent, FeedSink, LiveFeed, ResultSetDelegate, RowChangeKind, SectionChangeKind,
    SubscriptionHandle,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Install a test tracing subscriber honouring `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Record built from a JSON object literal
pub fn record(id: &str, value: serde_json::Value) -> Record {
    Record::new(id, Value::from(value))
}

/// Record with a `cat` section field and an `n` sort field
pub fn cat_record(id: &str, cat: &str, n: i64) -> Record {
    Record::new(id, Value::map().with("cat", cat).with("n", n))
}

/// Sectioned by `cat`, ascending by `n`
pub fn cat_ordering() -> OrderingSpec {
    OrderingSpec::new()
        .with_section_key("cat".parse().unwrap())
        .ascending_by("n".parse().unwrap())
}

struct Subscription {
    handle: SubscriptionHandle,
    query: String,
    sink: FeedSink,
}

/// In-memory live feed keyed by string queries
#[derive(Default)]
pub struct MemoryFeed {
    subscriptions: Mutex<Vec<Subscription>>,
    sinks: Mutex<Vec<FeedSink>>,
    unsubscribed: Mutex<Vec<SubscriptionHandle>>,
    initial: Mutex<Vec<Record>>,
    reject: Mutex<Option<FeedError>>,
}

impl MemoryFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records delivered as an initial load on every subscribe
    pub fn with_initial(records: Vec<Record>) -> Arc<Self> {
        let feed = Self::default();
        *feed.initial.lock() = records;
        Arc::new(feed)
    }

    /// Fail the next subscribe with `error`
    pub fn reject_next(&self, error: FeedError) {
        *self.reject.lock() = Some(error);
    }

    /// Push an event to every active subscription; returns accepted count
    pub fn emit(&self, event: FeedEvent) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.sink.deliver(event.clone()))
            .count()
    }

    pub fn add(&self, record: Record) -> usize {
        self.emit(FeedEvent::Added(record))
    }

    pub fn change(&self, record: Record) -> usize {
        self.emit(FeedEvent::Changed(record))
    }

    pub fn remove(&self, record: Record) -> usize {
        self.emit(FeedEvent::Removed(record))
    }

    /// Every sink ever handed to this feed, oldest first
    pub fn sinks(&self) -> Vec<FeedSink> {
        self.sinks.lock().clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.subscriptions.lock().iter().map(|s| s.query.clone()).collect()
    }

    pub fn unsubscribed(&self) -> Vec<SubscriptionHandle> {
        self.unsubscribed.lock().clone()
    }
}

#[async_trait::async_trait]
impl LiveFeed for MemoryFeed {
    type Query = String;

    async fn subscribe(&self, query: &String, sink: FeedSink) -> Result<SubscriptionHandle, FeedError> {
        if let Some(error) = self.reject.lock().take() {
            return Err(error);
        }

        let initial = self.initial.lock().clone();
        if !initial.is_empty() {
            for record in initial {
                sink.deliver(FeedEvent::Added(record));
            }
            sink.deliver(FeedEvent::InitialLoadComplete);
        }

        let handle = SubscriptionHandle::new();
        self.sinks.lock().push(sink.clone());
        self.subscriptions.lock().push(Subscription {
            handle,
            query: query.clone(),
            sink,
        });
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscriptions.lock().retain(|s| s.handle != handle);
        self.unsubscribed.lock().push(handle);
    }
}

/// One delegate callback, as observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    WillChange,
    Section {
        key: String,
        index: usize,
        kind: SectionChangeKind,
    },
    Row {
        identity: String,
        from: Option<IndexPath>,
        to: Option<IndexPath>,
        kind: RowChangeKind,
    },
    DidChange,
}

/// Delegate logging every callback and forwarding scripts to a channel
pub struct RecordingDelegate {
    log: Mutex<Vec<Notification>>,
    scripts: mpsc::UnboundedSender<ChangeScript>,
}

impl RecordingDelegate {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChangeScript>) {
        let (scripts, rx) = mpsc::unbounded_channel();
        let delegate = Arc::new(Self {
            log: Mutex::new(Vec::new()),
            scripts,
        });
        (delegate, rx)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().clone()
    }

    pub fn count(&self, notification: &Notification) -> usize {
        self.log.lock().iter().filter(|n| *n == notification).count()
    }

    /// Every `WillChange` closed by a `DidChange` before the next one opens
    pub fn is_balanced(&self) -> bool {
        let mut open = false;
        for notification in self.log.lock().iter() {
            match notification {
                Notification::WillChange if open => return false,
                Notification::WillChange => open = true,
                Notification::DidChange if !open => return false,
                Notification::DidChange => open = false,
                _ if !open => return false,
                _ => {}
            }
        }
        !open
    }
}

impl ResultSetDelegate for RecordingDelegate {
    fn will_change_content(&self) {
        self.log.lock().push(Notification::WillChange);
    }

    fn did_change_section(&self, key: &str, index: usize, kind: SectionChangeKind) {
        self.log.lock().push(Notification::Section {
            key: key.to_string(),
            index,
            kind,
        });
    }

    fn did_change_row(
        &self,
        record: &Record,
        from: Option<IndexPath>,
        to: Option<IndexPath>,
        kind: RowChangeKind,
    ) {
        self.log.lock().push(Notification::Row {
            identity: record.identity().to_string(),
            from,
            to,
            kind,
        });
    }

    fn did_change_content(&self, script: &ChangeScript) {
        self.log.lock().push(Notification::DidChange);
        let _ = self.scripts.send(script.clone());
    }
}

/// Wait for the next script, panicking after `timeout`
pub async fn next_script(rx: &mut mpsc::UnboundedReceiver<ChangeScript>, timeout: Duration) -> ChangeScript {
    tokio::time::timeout(timeout, rx.recv())
        .await
        .expect("timed out waiting for change script")
        .expect("delegate dropped")
}
