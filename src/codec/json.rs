use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::PayloadCodec;
use crate::error::QueueResult;

/// JSON codec: serde round trip through `serde_json::Value`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> PayloadCodec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, item: &T) -> QueueResult<Value> {
        Ok(serde_json::to_value(item)?)
    }

    fn decode(&self, payload: &Value) -> QueueResult<T> {
        Ok(serde_json::from_value(payload.clone())?)
    }
}
