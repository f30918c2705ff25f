#[cfg(feature = "memory")]
pub mod memory;

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;
use thiserror::Error;

/// Type alias for boxed streams (stable Rust compatible)
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// Result type for store primitives
pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure faults from the backing store.
///
/// The queue never retries, wraps, or downgrades these; they propagate to the
/// caller unchanged. Expected conditions (duplicate id, remove miss, empty
/// pop) are modeled as return values, not errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("store backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }
}

/// A document as the store sees it: an id plus an open field map.
///
/// The queue and the document store both speak this shape; everything above
/// it (payload decoding, record typing) happens in their layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDoc {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoredDoc {
    /// Create a document with no fields beyond its id
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Numeric sort key for `pop_min` ordering.
    ///
    /// `None` when the field is absent or non-numeric; such documents order
    /// before every keyed document (document-store convention: missing sorts
    /// first).
    pub fn sort_key(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(Value::as_u64)
    }
}

/// Outcome of an insert-if-absent.
///
/// Duplicate ids are an expected, common condition for the queue's dedup
/// guard, so they come back as a variant rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The document was created
    Inserted,
    /// A document with this id was already present; nothing changed
    AlreadyExists,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Single-field match condition for `find`.
///
/// Document-store equality semantics: a document matches when the named field
/// equals the value, or is an array containing the value. The field name
/// `"id"` matches the document id. This is what backs reverse resource
/// lookup in the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn new<S: Into<String>>(field: S, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    /// Whether a document satisfies this filter
    pub fn matches(&self, doc: &StoredDoc) -> bool {
        if self.field == "id" {
            return Value::from(doc.id.clone()) == self.value;
        }
        match doc.get(&self.field) {
            Some(Value::Array(items)) => items.contains(&self.value),
            Some(value) => *value == self.value,
            None => false,
        }
    }
}

/// Atomic document store primitives over named collections.
///
/// Every method is individually atomic with respect to concurrent callers;
/// that is the entire concurrency contract the queue builds on. Nothing here
/// spans two operations: composing primitives into larger transitions (and
/// owning the crash windows between them) is the queue's job.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Atomic compare-and-create keyed by `doc.id`
    async fn insert_unique(&self, collection: &str, doc: StoredDoc) -> StoreResult<InsertOutcome>;

    /// Atomically remove and return the document with the smallest
    /// `sort_field` value, or `None` when the collection is empty.
    ///
    /// Across concurrent callers the removed documents partition disjointly:
    /// no two callers ever receive the same document.
    async fn pop_min(&self, collection: &str, sort_field: &str) -> StoreResult<Option<StoredDoc>>;

    /// Atomically increment a counter field and return the new value,
    /// creating the counter document (starting from zero) when absent
    async fn fetch_increment(&self, collection: &str, id: &str, field: &str) -> StoreResult<u64>;

    /// Atomically remove and return the document with this id, or `None`
    async fn remove_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDoc>>;

    /// Fetch a document by id without removing it
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDoc>>;

    /// Unconditionally create or replace the document keyed by `doc.id`
    async fn put(&self, collection: &str, doc: StoredDoc) -> StoreResult<()>;

    /// Declare a secondary index on a field (idempotent)
    async fn ensure_index(&self, collection: &str, field: &str) -> StoreResult<()>;

    /// Irrecoverably drop a collection (no-op when absent)
    async fn drop_collection(&self, collection: &str) -> StoreResult<()>;

    /// Native document count, without materializing records
    async fn count(&self, collection: &str) -> StoreResult<u64>;

    /// Lazy, finite, non-restartable sequence of matching documents
    async fn find(
        &self,
        collection: &str,
        filter: Option<Filter>,
    ) -> StoreResult<BoxStream<StoreResult<StoredDoc>>>;
}
