//! Error types for result set addressing

/// Result set lookup errors
///
/// Only explicit coordinate lookups fail; apply and diff are total.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResultSetError {
    /// Section index beyond the current section count
    #[error("section {section} out of range (sections: {count})")]
    SectionOutOfRange {
        /// Requested section
        section: usize,
        /// Current number of sections
        count: usize,
    },

    /// Row index beyond the section's current length
    #[error("row {row} out of range in section {section} (rows: {count})")]
    RowOutOfRange {
        /// Section addressed
        section: usize,
        /// Requested row
        row: usize,
        /// Rows in that section
        count: usize,
    },
}
