//! Field paths for addressing attributes inside record values
//!
//! Provides [`FieldPath`] for dotted addressing (`meta.rank`) into a [`Value`](crate::Value).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path to a field nested inside a record value
///
/// Each segment names a map key. Resolution stops (yielding "missing") as
/// soon as a segment does not exist or the value at that point is not a map.
///
/// # Examples
/// - `["score"]` → `score`
/// - `["meta", "rank"]` → `meta.rank`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(SmallVec<[String; 2]>);

impl FieldPath {
    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<String>) -> Self {
        let mut segments = SmallVec::new();
        segments.push(segment.into());
        Self(segments)
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path has no segments (addresses the whole value)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Iterator over segments from outermost to innermost
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let segments = s
            .split('.')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment(s.to_string()))
                } else if seg.chars().any(char::is_whitespace) {
                    Err(PathError::InvalidSegment(seg.to_string()))
                } else {
                    Ok(seg.to_string())
                }
            })
            .collect::<Result<SmallVec<_>, _>>()?;

        Ok(Self(segments))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

/// Errors related to field paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path string was empty
    #[error("field path is empty")]
    Empty,

    /// Empty segment in path
    #[error("field path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Invalid segment characters
    #[error("invalid field path segment: {0:?} (must not contain whitespace)")]
    InvalidSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_single() {
        let path = FieldPath::single("score");
        assert_eq!(path.segments(), &["score"]);
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn path_child() {
        let parent = FieldPath::single("meta");
        let child = parent.child("rank");
        assert_eq!(child.segments(), &["meta", "rank"]);
    }

    #[test]
    fn path_display_roundtrips_through_from_str() {
        let path: FieldPath = "meta.rank.value".parse().unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "meta.rank.value");
    }

    #[test]
    fn path_from_str_rejects_empty() {
        assert_eq!("".parse::<FieldPath>(), Err(PathError::Empty));
    }

    #[test]
    fn path_from_str_empty_segment() {
        let result: Result<FieldPath, _> = "a..b".parse();
        assert!(matches!(result, Err(PathError::EmptySegment(_))));
    }

    #[test]
    fn path_from_str_invalid_chars() {
        let result: Result<FieldPath, _> = "a.b c".parse();
        assert!(matches!(result, Err(PathError::InvalidSegment(_))));
    }

    #[test]
    fn path_serde_as_string() {
        let path: FieldPath = "meta.rank".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"meta.rank\"");

        let back: FieldPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);

        assert!(serde_json::from_str::<FieldPath>("\"a..b\"").is_err());
    }
}
