//! Document-store abstraction the core persists through.
//!
//! The real backend (a hosted document database) is out of scope; the
//! core only relies on this narrow interface: per-document CRUD, filtered
//! queries, an atomic numeric increment, and live subscriptions that
//! re-deliver the full filtered result set on every change. The bundled
//! [`MemoryStore`] is the reference implementation used by tests and
//! embedders without a backend.
//!
//! Trait methods return `Send` futures so services generic over the store
//! can spawn background work (subscription pumps, concurrent reset
//! sweeps).

pub mod memory;

pub use memory::MemoryStore;

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Collection names used by the core.
pub mod collections {
    /// Task documents.
    pub const TASKS: &str = "tasks";
    /// Group documents.
    pub const GROUPS: &str = "groups";
    /// Per-(user, day) completion counters.
    pub const COMPLETION_HISTORY: &str = "completionHistory";
}

/// JSON field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// A stored document: identifier plus field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document identifier, unique within its collection.
    pub id: String,
    /// The document's fields.
    pub fields: Fields,
}

/// Errors surfaced by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document could not be encoded to or decoded from its typed model.
    #[error("document codec error: {0}")]
    Codec(String),

    /// The backend rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// A backend failure with the given description.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Comparison applied by a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals value (a `null` value also matches a missing field).
    Eq,
    /// Field is greater than or equal to value.
    Ge,
    /// Field is less than or equal to value.
    Le,
    /// Field is an array containing the value.
    Contains,
}

/// A single field predicate of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name the predicate applies to.
    pub field: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Value compared against.
    pub value: Value,
}

impl Filter {
    /// Equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Greater-or-equal filter.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Ge,
            value: value.into(),
        }
    }

    /// Less-or-equal filter.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Le,
            value: value.into(),
        }
    }

    /// Array-membership filter.
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Contains,
            value: value.into(),
        }
    }
}

/// Result ordering of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to sort by.
    pub field: String,
    /// Sort descending instead of ascending.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on the given field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending order on the given field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Identifier of a live subscription, used for explicit disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A live query subscription.
///
/// The receiver yields the full filtered result set: once immediately on
/// registration, then again after every change to the collection. Call
/// [`DocumentStore::unsubscribe`] with `id` to dispose of it explicitly;
/// a dropped receiver is also pruned lazily by the store.
#[derive(Debug)]
pub struct Subscription {
    /// Handle for explicit unsubscription.
    pub id: SubscriptionId,
    /// Snapshot deliveries.
    pub rx: mpsc::UnboundedReceiver<Vec<Document>>,
}

/// The persistence collaborator the core writes through.
///
/// Mutation serialization is the store's concern: `update` merges at
/// field granularity (last write wins per field) and `atomic_increment`
/// must be a true atomic add at the backend, never read-modify-write.
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetches a single document, `None` if absent.
    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Runs a filtered query, optionally ordered.
    fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&OrderBy>,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Writes a full document, replacing any existing fields.
    fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Merges partial fields into a document, creating it if absent.
    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a document; deleting an absent document is a no-op.
    fn delete(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Atomically adds `delta` to a numeric field, creating the document
    /// (and the field, at zero) if absent.
    fn atomic_increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Registers a live query; see [`Subscription`].
    fn subscribe(
        &self,
        collection: &str,
        filters: Vec<Filter>,
    ) -> impl Future<Output = Subscription> + Send;

    /// Disposes of a live query registered with [`subscribe`](Self::subscribe).
    fn unsubscribe(&self, id: SubscriptionId) -> impl Future<Output = ()> + Send;
}

/// Serializes a typed model into a document field map.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if the model does not serialize to a
/// JSON object.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Codec(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(StoreError::Codec(e.to_string())),
    }
}

/// Deserializes a document's fields into a typed model.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if the fields do not match the model.
pub fn from_document<T: DeserializeOwned>(doc: &Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc.fields.clone()))
        .map_err(|e| StoreError::Codec(e.to_string()))
}
