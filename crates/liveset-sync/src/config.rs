//! Batching configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default quiet window before a batch is flushed
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(300);

/// Debounce settings for a batch coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Time after the last event before the batch is flushed
    #[serde(rename = "quiet_window_ms", with = "duration_ms")]
    pub quiet_window: Duration,
    /// Flush after every event instead of waiting for quiet
    #[serde(default)]
    pub immediate: bool,
}

impl BatchConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With quiet window
    #[inline]
    #[must_use]
    pub fn with_quiet_window(mut self, window: Duration) -> Self {
        self.quiet_window = window;
        self
    }

    /// With immediate (per-event) flushing
    #[inline]
    #[must_use]
    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            quiet_window: DEFAULT_QUIET_WINDOW,
            immediate: false,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
