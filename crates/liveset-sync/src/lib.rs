//! Liveset Sync
//!
//! Keeps a [`liveset_core::ResultSet`] in step with a push-based live feed.
//!
//! # Core Concepts
//!
//! - [`LiveFeed`]: collaborator that pushes [`FeedEvent`]s into a [`FeedSink`]
//! - [`BatchCoordinator`]: debounces events into reconciled batches
//! - [`LiveResultsController`]: fetch lifecycle, apply and diff per batch
//! - [`ResultSetDelegate`]: bracketed change notifications for a consumer
//!
//! # Example
//!
//! ```rust,ignore
//! use liveset_sync::{BatchConfig, LiveResultsController};
//!
//! let controller = LiveResultsController::new(feed, ordering, delegate)
//!     .with_config(BatchConfig::new().with_quiet_window(Duration::from_millis(100)));
//! controller.perform_fetch(&query).await?;
//!
//! // later, skip the quiet window
//! controller.process_batch()?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod batcher;
mod config;
mod controller;
mod delegate;
mod error;
mod feed;

// Re-exports
pub use batcher::{BatchCoordinator, BatchEvent, BatchState, Change, CoordinatorHandle, PendingBatch};
pub use config::{BatchConfig, DEFAULT_QUIET_WINDOW};
pub use controller::LiveResultsController;
pub use delegate::{deliver_script, flatten, NoopDelegate, ResultSetDelegate, RowChangeKind, SectionChangeKind};
pub use error::{FeedError, SyncError};
pub use feed::{FeedEvent, FeedSink, Generation, LiveFeed, SubscriptionHandle};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
