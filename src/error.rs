use thiserror::Error;

use crate::store::StoreError;
use crate::types::Fingerprint;

/// Result type for queue and document store operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors surfaced by the queue service and the document store
#[derive(Error, Debug)]
pub enum QueueError {
    /// Fatal configuration error: rejected at construction, never recoverable
    #[error("queue name must be a non-empty alphanumeric string, got {0:?}")]
    InvalidQueueName(String),

    /// Caller-contract violation: resolve called for an item that was never
    /// dequeued (or was already resolved). Never retried automatically.
    #[error("item is not in progress: {0}")]
    NotInProgress(Fingerprint),

    /// A record with this id already exists where uniqueness is required
    #[error("duplicate record in {collection}: {id}")]
    DuplicateRecord { collection: String, id: String },

    /// Document store `create` with an id that is already present
    #[error("document already exists: {0}")]
    DocumentExists(String),

    /// A stored record is missing a field the queue relies on
    #[error("malformed record in {collection}: {reason}")]
    MalformedRecord { collection: String, reason: String },

    /// Payload encode/decode failure
    #[error("codec error: {source}")]
    Codec {
        #[from]
        source: serde_json::Error,
    },

    /// Infrastructure fault from the backing store, propagated unchanged
    #[error("store error: {source}")]
    Store {
        #[from]
        source: StoreError,
    },
}

impl QueueError {
    /// Create a malformed-record error
    pub fn malformed<S: Into<String>>(collection: S, reason: S) -> Self {
        Self::MalformedRecord {
            collection: collection.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a caller mistake rather than an infrastructure fault
    pub fn is_logic_fault(&self) -> bool {
        matches!(
            self,
            Self::NotInProgress(_) | Self::DocumentExists(_) | Self::InvalidQueueName(_)
        )
    }
}
