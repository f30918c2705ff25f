use crate::types::Fingerprint;

/// Contract a domain work item must satisfy to pass through the queue.
///
/// The fingerprint is the item's identity: it must be deterministic given the
/// item's content and stable for the item's lifetime. The queue deduplicates
/// on it and uses it as the record id in every channel.
pub trait Queueable: Send + Sync {
    /// Compute the stable content-derived identity of this item
    fn fingerprint(&self) -> Fingerprint;
}
