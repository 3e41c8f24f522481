//! Per-route result codecs.

use bytes::Bytes;
use lion_error::TalkResult;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Converts a route's return value to and from reply bytes.
///
/// A codec that encodes a value to zero bytes marks the reply as empty.
pub trait Codec<T>: Send + Sync + 'static {
    /// Encode a handler result.
    fn encode(&self, value: &T) -> TalkResult<Bytes>;

    /// Decode bytes received from a peer.
    fn decode(&self, bytes: &[u8]) -> TalkResult<T>;
}

/// Default codec: JSON, with `null` (unit, `None`) encoded as no bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> TalkResult<Bytes> {
        match serde_json::to_value(value)? {
            Value::Null => Ok(Bytes::new()),
            other => Ok(Bytes::from(serde_json::to_vec(&other)?)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> TalkResult<T> {
        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Passes raw bytes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec<Bytes> for RawCodec {
    fn encode(&self, value: &Bytes) -> TalkResult<Bytes> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> TalkResult<Bytes> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}
