pub mod fingerprint;
pub mod record;

pub use fingerprint::Fingerprint;
pub use record::{EnqueueOutcome, FailedItem, QueueRecord};
