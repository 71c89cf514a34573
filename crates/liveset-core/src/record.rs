//! Records delivered by the live feed

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Borrow;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// Stable identity of a record within its source
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Arc<str>);

impl Identity {
    /// Create identity from any string-like key
    #[inline]
    #[must_use]
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Identity as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque handle back into the external store
///
/// Never interpreted by this crate; forwarded untouched to whoever writes
/// back to the source.
#[derive(Clone)]
pub struct WriteHandle(Arc<dyn Any + Send + Sync>);

impl WriteHandle {
    /// Wrap a store-specific reference
    #[inline]
    #[must_use]
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    /// Borrow the wrapped reference as its concrete type
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl Debug for WriteHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("WriteHandle(..)")
    }
}

/// A keyed record with read-only attributes
#[derive(Debug, Clone)]
pub struct Record {
    identity: Identity,
    value: Value,
    write_handle: Option<WriteHandle>,
}

impl Record {
    /// Create record without a write handle
    #[inline]
    #[must_use]
    pub fn new(identity: impl Into<Identity>, value: Value) -> Self {
        Self {
            identity: identity.into(),
            value,
            write_handle: None,
        }
    }

    /// Attach a write handle
    #[inline]
    #[must_use]
    pub fn with_write_handle(mut self, handle: WriteHandle) -> Self {
        self.write_handle = Some(handle);
        self
    }

    /// Record identity
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Record attributes
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Pass-through handle for the external store
    #[inline]
    #[must_use]
    pub fn write_handle(&self) -> Option<&WriteHandle> {
        self.write_handle.as_ref()
    }
}

/// Records compare by identity and value; the write handle is ignored.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity && self.value == other.value
    }
}
