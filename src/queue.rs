use std::sync::Arc;

use tokio_stream::StreamExt;
use tracing::{debug, info, instrument};

use crate::codec::PayloadCodec;
use crate::error::{QueueError, QueueResult};
use crate::item::Queueable;
use crate::store::{InsertOutcome, StoreBackend, StoredDoc};
use crate::types::record::{FIELD_SEQ, FIELD_DATA};
use crate::types::{EnqueueOutcome, FailedItem, Fingerprint, QueueRecord};

/// Id of the single counter document in the counters channel
const COUNTER_ID: &str = "pending";

/// Logical channels of a queue instance.
///
/// Fixed at six; collection names are derived once at construction, never
/// recomputed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Counters,
    Index,
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Counters,
        Channel::Index,
        Channel::Pending,
        Channel::InProgress,
        Channel::Completed,
        Channel::Failed,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            Channel::Counters => "counters",
            Channel::Index => "index",
            Channel::Pending => "pending",
            Channel::InProgress => "in_progress",
            Channel::Completed => "completed",
            Channel::Failed => "failed",
        }
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|c| c == self).unwrap_or(0)
    }
}

/// Collection names for one queue instance, computed once
#[derive(Debug, Clone)]
struct ChannelSet {
    names: [String; 6],
}

impl ChannelSet {
    fn new(queue_name: &str) -> Self {
        let names = Channel::ALL.map(|channel| format!("{}_{}", queue_name, channel.suffix()));
        Self { names }
    }

    fn get(&self, channel: Channel) -> &str {
        &self.names[channel.position()]
    }
}

/// Persistent work queue for crawl jobs, composed from atomic store
/// primitives.
///
/// Items move `pending -> in_progress -> {completed | failed}`, ordered by a
/// per-queue monotonic sequence assigned at admission and deduplicated on the
/// item fingerprint. The queue holds no locks and runs no background work: it
/// is a stateless facade over the backend, safe to call from any number of
/// concurrent workers as long as each backend primitive is atomic.
///
/// # Delivery guarantees
///
/// Cross-collection transitions (`dequeue`, `resolve_completed`,
/// `resolve_failed`) are two independent atomic operations with no enclosing
/// transaction. A crash between the remove and the insert durably drops the
/// record from every observable collection. Delivery is therefore
/// at-most-once, with silent loss as the failure mode across a crash
/// boundary. This is a known limitation of the layout, not something the
/// queue compensates for; there is no lease or visibility-timeout
/// re-admission of stuck in-progress items.
pub struct WorkQueue<T, B> {
    name: String,
    channels: ChannelSet,
    backend: Arc<B>,
    codec: Arc<dyn PayloadCodec<T>>,
}

impl<T, B> WorkQueue<T, B>
where
    T: Queueable,
    B: StoreBackend,
{
    /// Create a queue instance over `backend`, initializing its channels.
    ///
    /// The name keys every collection and must be non-empty ASCII
    /// alphanumeric; anything else fails construction. Re-opening an existing
    /// queue is safe: initialization leaves live state untouched.
    pub async fn new(
        name: impl Into<String>,
        backend: Arc<B>,
        codec: Arc<dyn PayloadCodec<T>>,
    ) -> QueueResult<Self> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(QueueError::InvalidQueueName(name));
        }

        let queue = Self {
            channels: ChannelSet::new(&name),
            name,
            backend,
            codec,
        };
        queue.setup().await?;
        Ok(queue)
    }

    /// The queue instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self) -> QueueResult<()> {
        // An existing counter means a previous instance initialized this
        // queue; its value must survive re-opening.
        let counter = StoredDoc::new(COUNTER_ID).with_field(FIELD_SEQ, 0.into());
        self.backend
            .insert_unique(self.channels.get(Channel::Counters), counter)
            .await?;
        self.backend
            .ensure_index(self.channels.get(Channel::Pending), FIELD_SEQ)
            .await?;
        Ok(())
    }

    async fn next_sequence(&self) -> QueueResult<u64> {
        Ok(self
            .backend
            .fetch_increment(self.channels.get(Channel::Counters), COUNTER_ID, FIELD_SEQ)
            .await?)
    }

    /// Admit an item to pending.
    ///
    /// Idempotent on fingerprint identity: a duplicate submission is absorbed
    /// as [`EnqueueOutcome::AlreadyQueued`] without touching pending or the
    /// sequence counter. Sequence gaps across the queue's lifetime are
    /// acceptable and expected.
    #[instrument(skip(self, item), fields(queue = %self.name))]
    pub async fn enqueue(&self, item: &T) -> QueueResult<EnqueueOutcome> {
        let fingerprint = item.fingerprint();

        // Dedup guard: one index record per fingerprint ever admitted
        let guard = StoredDoc::new(fingerprint.as_str());
        let outcome = self
            .backend
            .insert_unique(self.channels.get(Channel::Index), guard)
            .await?;
        if outcome == InsertOutcome::AlreadyExists {
            debug!(%fingerprint, "duplicate submission absorbed");
            return Ok(EnqueueOutcome::AlreadyQueued);
        }

        let seq = self.next_sequence().await?;
        let payload = self.codec.encode(item)?;
        let record = QueueRecord::new(fingerprint.clone(), payload).with_seq(seq);
        self.insert_record(Channel::Pending, record).await?;

        debug!(%fingerprint, seq, "item admitted to pending");
        Ok(EnqueueOutcome::Enqueued { seq })
    }

    /// Take the oldest pending item and mark it in progress.
    ///
    /// Returns `None` when pending is empty (no side effects). The pop and
    /// the in-progress insert are separate atomic operations; see the type
    /// docs for the crash window this leaves open.
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn dequeue(&self) -> QueueResult<Option<T>> {
        let popped = self
            .backend
            .pop_min(self.channels.get(Channel::Pending), FIELD_SEQ)
            .await?;
        let Some(doc) = popped else {
            return Ok(None);
        };

        let record = QueueRecord::from_doc(&doc, self.channels.get(Channel::Pending))?;
        let item = self.codec.decode(&record.payload)?;

        // Sequence is not carried over: in-progress records are unordered
        let in_progress = QueueRecord::new(record.fingerprint.clone(), record.payload);
        self.insert_record(Channel::InProgress, in_progress).await?;

        debug!(fingerprint = %record.fingerprint, seq = ?record.seq, "item taken in progress");
        Ok(Some(item))
    }

    /// File an in-progress item under completed.
    ///
    /// The item is re-encoded, so mutations made since dequeue are captured.
    /// Calling this for an item that is not in progress is a caller-contract
    /// violation ([`QueueError::NotInProgress`]), never retried.
    #[instrument(skip(self, item), fields(queue = %self.name))]
    pub async fn resolve_completed(&self, item: &T) -> QueueResult<()> {
        let fingerprint = item.fingerprint();
        self.take_in_progress(&fingerprint).await?;

        let payload = self.codec.encode(item)?;
        self.insert_record(Channel::Completed, QueueRecord::new(fingerprint.clone(), payload))
            .await?;
        info!(%fingerprint, "item completed");
        Ok(())
    }

    /// File an in-progress item under failed, carrying a diagnostic reason.
    ///
    /// Same removal contract as [`WorkQueue::resolve_completed`].
    #[instrument(skip(self, item, reason), fields(queue = %self.name))]
    pub async fn resolve_failed(&self, item: &T, reason: impl Into<String>) -> QueueResult<()> {
        let fingerprint = item.fingerprint();
        self.take_in_progress(&fingerprint).await?;

        let reason = reason.into();
        let payload = self.codec.encode(item)?;
        let record = QueueRecord::new(fingerprint.clone(), payload).with_reason(reason.clone());
        self.insert_record(Channel::Failed, record).await?;
        info!(%fingerprint, %reason, "item failed");
        Ok(())
    }

    /// Number of pending records (native count, nothing materialized)
    pub async fn count(&self) -> QueueResult<u64> {
        Ok(self
            .backend
            .count(self.channels.get(Channel::Pending))
            .await?)
    }

    /// Decoded snapshot of all in-progress items
    pub async fn get_in_progress(&self) -> QueueResult<Vec<T>> {
        self.snapshot(Channel::InProgress).await
    }

    /// Decoded snapshot of all completed items
    pub async fn get_completed(&self) -> QueueResult<Vec<T>> {
        self.snapshot(Channel::Completed).await
    }

    /// Decoded snapshot of all failed items with their failure reasons
    pub async fn get_failed(&self) -> QueueResult<Vec<FailedItem<T>>> {
        let collection = self.channels.get(Channel::Failed);
        let mut stream = self.backend.find(collection, None).await?;
        let mut items = Vec::new();
        while let Some(doc) = stream.next().await {
            let doc = doc?;
            let record = QueueRecord::from_doc(&doc, collection)?;
            items.push(FailedItem {
                item: self.codec.decode(&record.payload)?,
                reason: record.reason.unwrap_or_default(),
            });
        }
        Ok(items)
    }

    /// Irrecoverably drop every channel and reinitialize.
    ///
    /// All in-flight state is lost and the sequence counter restarts, so the
    /// next admitted item receives the queue's first sequence value. Intended
    /// for tests and resets, not production recovery.
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn clean(&self) -> QueueResult<()> {
        for channel in Channel::ALL {
            self.backend
                .drop_collection(self.channels.get(channel))
                .await?;
        }
        self.setup().await?;
        info!("queue reset");
        Ok(())
    }

    /// Move every failed record back to pending, then drop the failed
    /// channel.
    ///
    /// Each record is assigned a fresh sequence number, so requeued work
    /// dequeues after everything already pending; failure reasons are
    /// discarded. A collision with a live pending record surfaces as
    /// [`QueueError::DuplicateRecord`].
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn re_enqueue_failed(&self) -> QueueResult<()> {
        self.requeue_channel(Channel::Failed).await
    }

    /// [`WorkQueue::re_enqueue_failed`], then the same move for every
    /// completed record.
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn re_enqueue_all(&self) -> QueueResult<()> {
        self.requeue_channel(Channel::Failed).await?;
        self.requeue_channel(Channel::Completed).await
    }

    async fn requeue_channel(&self, channel: Channel) -> QueueResult<()> {
        let collection = self.channels.get(channel);

        // Materialize before moving: the source channel is dropped only after
        // every record made it back to pending.
        let mut stream = self.backend.find(collection, None).await?;
        let mut docs = Vec::new();
        while let Some(doc) = stream.next().await {
            docs.push(doc?);
        }
        drop(stream);

        let moved = docs.len();
        for doc in docs {
            let record = QueueRecord::from_doc(&doc, collection)?;
            let seq = self.next_sequence().await?;
            let pending = QueueRecord::new(record.fingerprint, record.payload).with_seq(seq);
            self.insert_record(Channel::Pending, pending).await?;
        }

        self.backend.drop_collection(collection).await?;
        info!(channel = collection, moved, "records moved back to pending");
        Ok(())
    }

    /// Remove the in-progress record for a fingerprint, or fail the caller
    /// contract
    async fn take_in_progress(&self, fingerprint: &Fingerprint) -> QueueResult<StoredDoc> {
        self.backend
            .remove_by_id(self.channels.get(Channel::InProgress), fingerprint.as_str())
            .await?
            .ok_or_else(|| QueueError::NotInProgress(fingerprint.clone()))
    }

    async fn insert_record(&self, channel: Channel, record: QueueRecord) -> QueueResult<()> {
        let collection = self.channels.get(channel);
        let id = record.fingerprint.as_str().to_string();
        match self
            .backend
            .insert_unique(collection, record.into_doc())
            .await?
        {
            InsertOutcome::Inserted => Ok(()),
            InsertOutcome::AlreadyExists => Err(QueueError::DuplicateRecord {
                collection: collection.to_string(),
                id,
            }),
        }
    }

    async fn snapshot(&self, channel: Channel) -> QueueResult<Vec<T>> {
        let collection = self.channels.get(channel);
        let mut stream = self.backend.find(collection, None).await?;
        let mut items = Vec::new();
        while let Some(doc) = stream.next().await {
            let doc = doc?;
            let value = doc
                .get(FIELD_DATA)
                .ok_or_else(|| QueueError::malformed(collection, "missing data field"))?;
            items.push(self.codec.decode(value)?);
        }
        Ok(items)
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::store::memory::MemoryStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Job {
        url: String,
    }

    impl Queueable for Job {
        fn fingerprint(&self) -> Fingerprint {
            Fingerprint::of_bytes(self.url.as_bytes())
        }
    }

    async fn open(name: &str) -> QueueResult<WorkQueue<Job, MemoryStore>> {
        WorkQueue::new(name, Arc::new(MemoryStore::new()), Arc::new(JsonCodec)).await
    }

    #[tokio::test]
    async fn name_must_be_alphanumeric() {
        for bad in ["", "with space", "dash-ed", "uns_core", "q/q"] {
            let err = open(bad).await.err().expect("name should be rejected");
            assert!(matches!(err, QueueError::InvalidQueueName(_)));
        }
        assert!(open("crawler01").await.is_ok());
    }

    #[test]
    fn channel_names_derive_from_queue_name() {
        let channels = ChannelSet::new("crawler");
        assert_eq!(channels.get(Channel::Counters), "crawler_counters");
        assert_eq!(channels.get(Channel::Index), "crawler_index");
        assert_eq!(channels.get(Channel::Pending), "crawler_pending");
        assert_eq!(channels.get(Channel::InProgress), "crawler_in_progress");
        assert_eq!(channels.get(Channel::Completed), "crawler_completed");
        assert_eq!(channels.get(Channel::Failed), "crawler_failed");
    }

    #[tokio::test]
    async fn reopening_preserves_counter() {
        let backend = Arc::new(MemoryStore::new());
        let codec: Arc<dyn PayloadCodec<Job>> = Arc::new(JsonCodec);

        let queue: WorkQueue<Job, _> =
            WorkQueue::new("q1", Arc::clone(&backend), Arc::clone(&codec))
                .await
                .unwrap();
        let outcome = queue
            .enqueue(&Job { url: "https://a/".into() })
            .await
            .unwrap();
        assert_eq!(outcome, EnqueueOutcome::Enqueued { seq: 1 });

        // A second instance over the same backend must not reset sequencing
        let reopened: WorkQueue<Job, _> = WorkQueue::new("q1", backend, codec).await.unwrap();
        let outcome = reopened
            .enqueue(&Job { url: "https://b/".into() })
            .await
            .unwrap();
        assert_eq!(outcome, EnqueueOutcome::Enqueued { seq: 2 });
    }

    #[tokio::test]
    async fn pending_index_is_declared_on_the_sequence_field() {
        let backend = Arc::new(MemoryStore::new());
        let _queue: WorkQueue<Job, _> =
            WorkQueue::new("q1", Arc::clone(&backend), Arc::new(JsonCodec))
                .await
                .unwrap();
        assert_eq!(backend.indexed_fields("q1_pending"), vec!["seq".to_string()]);
    }
}
