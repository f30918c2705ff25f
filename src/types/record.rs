use serde_json::Value;

use crate::error::{QueueError, QueueResult};
use crate::store::StoredDoc;
use crate::types::Fingerprint;

/// Field carrying the pending-admission sequence number
pub const FIELD_SEQ: &str = "seq";
/// Field carrying the encoded payload
pub const FIELD_DATA: &str = "data";
/// Field carrying the failure diagnostic on failed records
pub const FIELD_REASON: &str = "reason";

/// Stored shape of an item within one queue channel:
/// `{id: fingerprint, seq?, data, reason?}`.
///
/// `seq` is present on pending records only; `reason` on failed records only.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRecord {
    pub fingerprint: Fingerprint,
    pub seq: Option<u64>,
    pub payload: Value,
    pub reason: Option<String>,
}

impl QueueRecord {
    /// Create a record with just identity and payload
    pub fn new(fingerprint: Fingerprint, payload: Value) -> Self {
        Self {
            fingerprint,
            seq: None,
            payload,
            reason: None,
        }
    }

    /// Attach a sequence number (pending records)
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Attach a failure reason (failed records)
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Convert to the store-level document shape
    pub fn into_doc(self) -> StoredDoc {
        let mut doc = StoredDoc::new(self.fingerprint.as_str());
        if let Some(seq) = self.seq {
            doc = doc.with_field(FIELD_SEQ, Value::from(seq));
        }
        doc = doc.with_field(FIELD_DATA, self.payload);
        if let Some(reason) = self.reason {
            doc = doc.with_field(FIELD_REASON, Value::from(reason));
        }
        doc
    }

    /// Parse a store-level document back into a record.
    ///
    /// `collection` is only used for error reporting.
    pub fn from_doc(doc: &StoredDoc, collection: &str) -> QueueResult<Self> {
        let payload = doc
            .get(FIELD_DATA)
            .cloned()
            .ok_or_else(|| QueueError::malformed(collection, "missing data field"))?;
        Ok(Self {
            fingerprint: Fingerprint::new(doc.id.clone()),
            seq: doc.get(FIELD_SEQ).and_then(Value::as_u64),
            payload,
            reason: doc
                .get(FIELD_REASON)
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Outcome of an enqueue attempt.
///
/// A duplicate submission is an expected, non-error condition: the item is
/// already tracked and the call is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The item was admitted to pending with this sequence number
    Enqueued { seq: u64 },
    /// An item with the same fingerprint was already admitted
    AlreadyQueued,
}

impl EnqueueOutcome {
    /// Whether this call actually created a pending record
    pub fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued { .. })
    }
}

/// A decoded failed item together with its failure diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem<T> {
    pub item: T,
    pub reason: String,
}
