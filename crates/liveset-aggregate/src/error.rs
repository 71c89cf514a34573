//! Aggregator error types

use crate::aggregator::MemberId;

/// Errors from aggregate coordinate lookups and membership
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    /// Member not attached to this aggregator
    #[error("unknown member {0}")]
    UnknownMember(MemberId),

    /// Section index beyond the section count
    #[error("section {section} out of range (sections: {count})")]
    SectionOutOfRange {
        /// Requested section
        section: usize,
        /// Sections available
        count: usize,
    },

    /// Only one extra member may be attached
    #[error("extra member already attached")]
    ExtraAlreadyAttached,
}
