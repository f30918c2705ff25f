pub mod json;

pub use json::JsonCodec;

use serde_json::Value;

use crate::error::QueueResult;

/// Converts a domain item to and from the opaque representation the store
/// holds.
///
/// `decode(encode(item))` must reproduce the item exactly for any value
/// previously produced by `encode`. The queue re-encodes on every write, so
/// mutations made to an item between dequeue and resolve are captured.
pub trait PayloadCodec<T>: Send + Sync {
    fn encode(&self, item: &T) -> QueueResult<Value>;
    fn decode(&self, payload: &Value) -> QueueResult<T>;
}

/// Serde adapter wrapping raw bytes in a binary-safe base64 string for
/// storage.
///
/// Stores that distinguish text from binary cannot hold raw payload bytes in
/// a text field; annotate such fields with
/// `#[serde(with = "crawl_queue::codec::base64_bytes")]`. Purely a
/// storage-format concern: the logical payload is unchanged on read.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
