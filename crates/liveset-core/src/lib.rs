//! Liveset Core
//!
//! Ordered, sectioned materialized views over keyed records, with batched
//! incremental apply and classified change scripts between snapshots.
//!
//! # Core Concepts
//!
//! - [`Value`] / [`FieldPath`]: structured record attributes and addressing
//! - [`Record`] / [`Identity`]: keyed records as delivered by a live feed
//! - [`OrderingSpec`]: section key extractor plus comparator chain
//! - [`Section`]: ordered bucket of records sharing a section key
//! - [`ResultSet`]: the view itself; [`ResultSet::apply`] takes a [`Batch`]
//! - [`diff`]: compares two snapshots into a [`ChangeScript`]
//!
//! # Example
//!
//! ```rust
//! use liveset_core::{diff, Batch, OrderingSpec, Record, ResultSet, Value};
//!
//! let ordering = OrderingSpec::new()
//!     .with_section_key("cat".parse().unwrap())
//!     .ascending_by("n".parse().unwrap());
//! let before = ResultSet::new(ordering);
//!
//! let batch = Batch::inserts(vec![
//!     Record::new("a", Value::map().with("cat", 1).with("n", 5)),
//!     Record::new("b", Value::map().with("cat", 1).with("n", 2)),
//! ]);
//! let mut after = before.clone();
//! after.apply(&batch);
//!
//! let script = diff(&before, &after, &batch.changed_identities());
//! assert_eq!(script.inserted_sections.len(), 1);
//! assert_eq!(script.inserted_rows.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod diff;
mod error;
mod ordering;
mod path;
mod record;
mod result_set;
mod section;
pub mod sequence;
mod value;

// Re-exports
pub use diff::{
    diff, ChangeScript, ChangeStep, LayoutSection, RowChange, RowMove, SectionChange,
    SectionLayout,
};
pub use error::ResultSetError;
pub use ordering::{OrderingSpec, SortDescriptor};
pub use path::{FieldPath, PathError};
pub use record::{Identity, Record, WriteHandle};
pub use result_set::{Batch, IndexPath, Predicate, ResultSet};
pub use section::Section;
pub use value::Value;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
