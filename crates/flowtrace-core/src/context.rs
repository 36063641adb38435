use crate::error::{FlowError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Metadata carried by a flow context
pub type Metadata = HashMap<String, Value>;

/// Carries a correlation ID and arbitrary metadata through a flow execution.
///
/// A `FlowContext` is a cheap, shareable handle: clones observe the same
/// metadata. The correlation ID never changes after construction. Use
/// [`FlowContext::fork`] to hand a flow across a task or process boundary
/// with an independent copy of the metadata.
#[derive(Clone)]
pub struct FlowContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    correlation_id: String,
    metadata: RwLock<Metadata>,
}

impl FlowContext {
    /// Create a context with a freshly generated correlation ID
    pub fn new() -> Self {
        Self::with_correlation_id(generate_correlation_id())
    }

    /// Create a context for an existing correlation ID
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self::from_parts(correlation_id.into(), Metadata::new())
    }

    fn from_parts(correlation_id: String, metadata: Metadata) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                correlation_id,
                metadata: RwLock::new(metadata),
            }),
        }
    }

    /// The correlation ID shared by all work of this flow instance
    pub fn correlation_id(&self) -> &str {
        &self.inner.correlation_id
    }

    /// Return a metadata value, or `None` if the key is absent
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.inner.metadata.read().get(key).cloned()
    }

    /// Return a metadata value, or `default` if the key is absent
    pub fn get_value_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.get_value(key).unwrap_or_else(|| default.into())
    }

    /// Set a metadata value, replacing any previous one
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.metadata.write().insert(key.into(), value.into());
    }

    /// Remove a metadata key, returning its value
    pub fn delete_value(&self, key: &str) -> Result<Value> {
        self.inner
            .metadata
            .write()
            .remove(key)
            .ok_or_else(|| FlowError::MetadataKeyNotFound(key.to_string()))
    }

    /// Point-in-time copy of the metadata
    pub fn metadata(&self) -> Metadata {
        self.inner.metadata.read().clone()
    }

    /// Create a child context sharing the correlation ID.
    ///
    /// Metadata is deep-copied; mutations on either side stay on that side.
    pub fn fork(&self) -> Self {
        Self::from_parts(self.inner.correlation_id.clone(), self.metadata())
    }

    /// True when both handles refer to the same context instance
    pub fn same_instance(&self, other: &FlowContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Serializable copy of this context for crossing a process boundary
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            correlation_id: self.inner.correlation_id.clone(),
            metadata: self.metadata(),
        }
    }

    /// Rebuild a context from a snapshot taken elsewhere
    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        Self::from_parts(snapshot.correlation_id, snapshot.metadata)
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowContext")
            .field("correlation_id", &self.inner.correlation_id)
            .field("metadata", &*self.inner.metadata.read())
            .finish()
    }
}

/// Wire form of a [`FlowContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Correlation ID of the flow instance
    pub correlation_id: String,

    /// Metadata at the time the snapshot was taken
    #[serde(default)]
    pub metadata: Metadata,
}

/// Generate a new correlation ID (UUID v4 as 32 lowercase hex characters)
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}
