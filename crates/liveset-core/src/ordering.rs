//! Ordering specification
//!
//! Pure configuration: an optional section-key extractor plus an ordered
//! comparator chain. The effective sort key of a record is
//! `(section key, comparator₁, comparator₂, …, identity)`.

use crate::path::FieldPath;
use crate::record::Record;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Single comparator in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    /// Field compared by this descriptor
    pub path: FieldPath,
    /// Ascending when true, descending otherwise
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl SortDescriptor {
    /// Ascending comparator on `path`
    #[inline]
    #[must_use]
    pub fn ascending(path: FieldPath) -> Self {
        Self {
            path,
            ascending: true,
        }
    }

    /// Descending comparator on `path`
    #[inline]
    #[must_use]
    pub fn descending(path: FieldPath) -> Self {
        Self {
            path,
            ascending: false,
        }
    }

    /// Compare two values on this descriptor's field
    ///
    /// A missing field on either side is a tie.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a.get_path(&self.path), b.get_path(&self.path)) {
            (Some(x), Some(y)) => {
                let ord = x.total_cmp(y);
                if self.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            }
            _ => Ordering::Equal,
        }
    }
}

/// Section grouping and sort order for a result set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingSpec {
    /// Field whose value names the record's section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_key_path: Option<FieldPath>,
    /// Comparator chain, most significant first
    #[serde(default)]
    pub comparators: Vec<SortDescriptor>,
}

impl OrderingSpec {
    /// Unsectioned spec with no comparators (identity order)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With section key path
    #[inline]
    #[must_use]
    pub fn with_section_key(mut self, path: FieldPath) -> Self {
        self.section_key_path = Some(path);
        self
    }

    /// Append an ascending comparator
    #[inline]
    #[must_use]
    pub fn ascending_by(mut self, path: FieldPath) -> Self {
        self.comparators.push(SortDescriptor::ascending(path));
        self
    }

    /// Append a descending comparator
    #[inline]
    #[must_use]
    pub fn descending_by(mut self, path: FieldPath) -> Self {
        self.comparators.push(SortDescriptor::descending(path));
        self
    }

    /// Section key for a value; absent path or missing field yields `""`
    #[must_use]
    pub fn section_key<'a>(&self, value: &'a Value) -> Cow<'a, str> {
        self.section_key_path
            .as_ref()
            .and_then(|path| value.get_path(path))
            .map_or(Cow::Borrowed(""), Value::section_label)
    }

    /// Compare two values through the comparator chain only
    #[must_use]
    pub fn compare_values(&self, a: &Value, b: &Value) -> Ordering {
        self.comparators
            .iter()
            .map(|descriptor| descriptor.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Order of two records within one section
    ///
    /// Identity breaks ties left by the comparator chain, so the order is total.
    #[must_use]
    pub fn compare_in_section(&self, a: &Record, b: &Record) -> Ordering {
        self.compare_values(a.value(), b.value())
            .then_with(|| a.identity().cmp(b.identity()))
    }

    /// Global order of two records: section key first, then in-section order
    #[must_use]
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.section_key(a.value())
            .cmp(&self.section_key(b.value()))
            .then_with(|| self.compare_in_section(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, json: serde_json::Value) -> Record {
        Record::new(id, Value::from(json))
    }

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    #[test]
    fn section_key_defaults_to_empty() {
        let spec = OrderingSpec::new();
        assert_eq!(spec.section_key(&Value::from(json!({"cat": 1}))), "");

        let spec = OrderingSpec::new().with_section_key(path("cat"));
        assert_eq!(spec.section_key(&Value::from(json!({"cat": 1}))), "1");
        assert_eq!(spec.section_key(&Value::from(json!({"other": 1}))), "");
    }

    #[test]
    fn comparator_chain_falls_through_on_ties() {
        let spec = OrderingSpec::new()
            .ascending_by(path("a"))
            .descending_by(path("b"));

        let x = rec("x", json!({"a": 1, "b": 1}));
        let y = rec("y", json!({"a": 1, "b": 2}));
        let z = rec("z", json!({"a": 0, "b": 0}));

        assert_eq!(spec.compare(&y, &x), Ordering::Less);
        assert_eq!(spec.compare(&z, &x), Ordering::Less);
    }

    #[test]
    fn missing_field_is_a_tie_then_identity_decides() {
        let spec = OrderingSpec::new().ascending_by(path("n"));

        let a = rec("a", json!({"n": 9}));
        let b = rec("b", json!({}));

        assert_eq!(spec.compare_values(a.value(), b.value()), Ordering::Equal);
        assert_eq!(spec.compare(&a, &b), Ordering::Less);
        assert_eq!(spec.compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn section_key_dominates_comparators() {
        let spec = OrderingSpec::new()
            .with_section_key(path("cat"))
            .ascending_by(path("n"));

        let a = rec("a", json!({"cat": "b", "n": 1}));
        let b = rec("b", json!({"cat": "a", "n": 100}));
        assert_eq!(spec.compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn spec_deserializes_from_json_config() {
        let spec: OrderingSpec = serde_json::from_value(json!({
            "section_key_path": "cat",
            "comparators": [
                {"path": "n"},
                {"path": "meta.rank", "ascending": false}
            ]
        }))
        .unwrap();

        assert_eq!(spec.section_key_path, Some(path("cat")));
        assert_eq!(spec.comparators.len(), 2);
        assert!(spec.comparators[0].ascending);
        assert!(!spec.comparators[1].ascending);
    }
}
