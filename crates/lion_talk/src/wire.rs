//! Request and reply messages exchanged between peers.
//!
//! A request is a route name plus positional and keyword arguments, carried as
//! JSON. A reply is a tagged result with a one-byte discriminant so the caller
//! can tell "handler returned nothing" apart from "handler failed".

use bytes::{BufMut, Bytes, BytesMut};
use lion_error::{TalkError, TalkErrorKind, TalkResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arguments for a route call: positional values plus keyword values.
///
/// # Examples
///
/// ```
/// use lion_talk::Args;
///
/// let args = Args::new().arg("leo_02_01").kwarg("port", 5002);
/// let peer: String = args.get(0, "appid").unwrap();
/// let port: u16 = args.get(1, "port").unwrap();
/// assert_eq!(peer, "leo_02_01");
/// assert_eq!(port, 5002);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl Args {
    /// Empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Append any serializable value as a positional argument.
    pub fn arg_serialized<T: Serialize>(self, value: &T) -> TalkResult<Self> {
        Ok(self.arg(serde_json::to_value(value)?))
    }

    /// Raw lookup: keyword `name` first, then positional slot `index`.
    pub fn value(&self, index: usize, name: &str) -> Option<&Value> {
        self.kwargs.get(name).or_else(|| self.args.get(index))
    }

    /// Typed lookup: keyword `name` first, then positional slot `index`.
    #[track_caller]
    pub fn get<T: DeserializeOwned>(&self, index: usize, name: &str) -> TalkResult<T> {
        let value = self
            .value(index, name)
            .ok_or_else(|| TalkError::new(TalkErrorKind::MissingArgument(name.to_string())))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            TalkError::new(TalkErrorKind::InvalidArgument {
                name: name.to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Typed lookup that yields `None` when the argument is absent.
    pub fn get_opt<T: DeserializeOwned>(&self, index: usize, name: &str) -> TalkResult<Option<T>> {
        match self.value(index, name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get(index, name).map(Some),
        }
    }

    /// Whether no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

/// A route invocation as carried over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Name of the route to run on the receiver.
    pub route: String,
    /// Arguments for the route.
    #[serde(flatten)]
    pub args: Args,
}

impl Request {
    /// Create a request for `route` with the given arguments.
    pub fn new(route: impl Into<String>, args: Args) -> Self {
        Self {
            route: route.into(),
            args,
        }
    }

    /// Serialize to a frame body.
    pub fn to_bytes(&self) -> TalkResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Parse a frame body.
    pub fn from_bytes(bytes: &[u8]) -> TalkResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

const TAG_EMPTY: u8 = 0;
const TAG_VALUE: u8 = 1;
const TAG_ERROR: u8 = 2;

/// Outcome of a route call, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The handler ran and produced no value, or the receiver wrote nothing.
    Empty,
    /// The handler's encoded return value.
    Value(Bytes),
    /// The handler failed; carries the failure message.
    Error(String),
}

impl Reply {
    /// Encode with a leading one-byte discriminant.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Empty => Bytes::from_static(&[TAG_EMPTY]),
            Self::Value(payload) => {
                let mut buf = BytesMut::with_capacity(1 + payload.len());
                buf.put_u8(TAG_VALUE);
                buf.put_slice(payload);
                buf.freeze()
            }
            Self::Error(message) => {
                let mut buf = BytesMut::with_capacity(1 + message.len());
                buf.put_u8(TAG_ERROR);
                buf.put_slice(message.as_bytes());
                buf.freeze()
            }
        }
    }

    /// Decode a frame body. A zero-length body is treated as `Empty`.
    #[track_caller]
    pub fn from_bytes(bytes: &[u8]) -> TalkResult<Self> {
        let Some((&tag, rest)) = bytes.split_first() else {
            return Ok(Self::Empty);
        };
        match tag {
            TAG_EMPTY => Ok(Self::Empty),
            TAG_VALUE => Ok(Self::Value(Bytes::copy_from_slice(rest))),
            TAG_ERROR => Ok(Self::Error(String::from_utf8_lossy(rest).into_owned())),
            other => Err(TalkError::new(TalkErrorKind::Frame(format!(
                "unknown reply tag {other}"
            )))),
        }
    }

    /// Encode a serializable value as a `Value` reply.
    pub fn json<T: Serialize>(value: &T) -> TalkResult<Self> {
        Ok(Self::Value(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Decode a `Value` reply as JSON. `Empty` yields `None`, `Error` an error.
    #[track_caller]
    pub fn parse_json<T: DeserializeOwned>(&self) -> TalkResult<Option<T>> {
        match self {
            Self::Empty => Ok(None),
            Self::Value(payload) => Ok(Some(serde_json::from_slice(payload)?)),
            Self::Error(message) => Err(TalkError::new(TalkErrorKind::Remote(message.clone()))),
        }
    }

    /// Whether this is the `Empty` variant.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether this is the `Error` variant.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
