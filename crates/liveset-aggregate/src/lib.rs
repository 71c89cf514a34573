//! Liveset Aggregate
//!
//! Presents several live result sets as one sectioned view. Each member's
//! sections follow the sections of every member attached before it; an
//! optional extra member always comes last.
//!
//! # Example
//!
//! ```rust,ignore
//! use liveset_aggregate::ResultAggregator;
//!
//! let aggregator = ResultAggregator::new(consumer);
//! let inbox = LiveResultsController::new(feed.clone(), ordering.clone(), Arc::new(aggregator.attach()));
//! let archive = LiveResultsController::new(feed, ordering, Arc::new(aggregator.attach()));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod aggregator;
mod error;

pub use aggregator::{AggregateDelegate, MemberDelegate, MemberId, ResultAggregator};
pub use error::AggregateError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
