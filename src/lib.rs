//! # crawl-queue: persistent work queue for crawl jobs
//!
//! `crawl-queue` is a crash-tolerant work queue backed by an atomic document
//! store, plus an adjacent keyed document store with secondary resource
//! indexing. The queue composes per-document atomic primitives
//! (insert-if-absent, pop-minimum, remove-by-id, counter increment) into FIFO
//! job processing with fingerprint-based deduplication:
//!
//! - **Strict arrival ordering**: a per-queue monotonic sequence is assigned
//!   at admission and `dequeue` always takes the minimum
//! - **Idempotent submission**: two items with the same content fingerprint
//!   are one queue entry; duplicates are absorbed, not errors
//! - **Stateless service**: no locks, no background threads; safe from any
//!   number of concurrent processes as long as the backend's primitives are
//!   individually atomic
//! - **Store agnostic**: any backend implementing [`StoreBackend`] works;
//!   an in-memory backend ships for tests and development
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use crawl_queue::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct CrawlJob {
//!     url: String,
//! }
//!
//! impl Queueable for CrawlJob {
//!     fn fingerprint(&self) -> Fingerprint {
//!         Fingerprint::of_bytes(self.url.as_bytes())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> QueueResult<()> {
//! let backend = Arc::new(MemoryStore::new());
//! let queue: WorkQueue<CrawlJob, _> =
//!     WorkQueue::new("crawler", backend, Arc::new(JsonCodec)).await?;
//!
//! queue.enqueue(&CrawlJob { url: "https://example.com/".into() }).await?;
//!
//! while let Some(job) = queue.dequeue().await? {
//!     match fetch(&job).await {
//!         Ok(()) => queue.resolve_completed(&job).await?,
//!         Err(reason) => queue.resolve_failed(&job, reason).await?,
//!     }
//! }
//! # Ok(())
//! # }
//! # async fn fetch(_job: &CrawlJob) -> Result<(), String> { Ok(()) }
//! ```
//!
//! ## Delivery guarantees
//!
//! Transitions that span two collections (`pending -> in_progress`,
//! `in_progress -> completed/failed`) are two independent atomic store
//! operations, not one transaction. A crash between them loses the record
//! from every observable collection: delivery is **at-most-once**, and the
//! loss is silent. See [`WorkQueue`] for the full contract before assuming
//! redelivery semantics.

pub mod codec;
pub mod docstore;
pub mod error;
pub mod item;
pub mod queue;
pub mod store;
pub mod types;

pub use codec::{JsonCodec, PayloadCodec};
pub use docstore::{Document, DocumentStore, DocumentStream};
pub use error::{QueueError, QueueResult};
pub use item::Queueable;
pub use queue::{Channel, WorkQueue};
pub use store::{Filter, InsertOutcome, StoreBackend, StoreError, StoredDoc};
pub use types::{EnqueueOutcome, FailedItem, Fingerprint, QueueRecord};

#[cfg(feature = "memory")]
pub use store::memory::MemoryStore;

/// Convenience imports for queue producers and workers
pub mod prelude {
    pub use crate::{
        Document, DocumentStore, EnqueueOutcome, FailedItem, Fingerprint, JsonCodec, PayloadCodec,
        Queueable, QueueError, QueueResult, StoreBackend, WorkQueue,
    };

    #[cfg(feature = "memory")]
    pub use crate::MemoryStore;

    pub use async_trait::async_trait;
}
