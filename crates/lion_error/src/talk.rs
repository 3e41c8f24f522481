//! Error types for shard-talk messaging.

/// Result type for shard-talk operations.
pub type TalkResult<T> = Result<T, TalkError>;

/// Error kinds for shard-talk operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TalkErrorKind {
    /// Could not open a connection to a peer or the server.
    #[display("Could not connect to {}: {}", address, message)]
    Connect {
        /// Address that was dialled.
        address: String,
        /// Underlying error message.
        message: String,
    },

    /// Could not bind a listening socket.
    #[display("Could not bind {}: {}", address, message)]
    Bind {
        /// Address that was requested.
        address: String,
        /// Underlying error message.
        message: String,
    },

    /// Socket read or write failed mid-exchange.
    #[display("I/O error: {}", _0)]
    Io(String),

    /// A frame was malformed or exceeded the size limit.
    #[display("Invalid frame: {}", _0)]
    Frame(String),

    /// A value could not be serialized or deserialized.
    #[display("Serialization error: {}", _0)]
    Serialization(String),

    /// Peer identifier is not present in the directory.
    #[display("Peer '{}' not found", _0)]
    UnknownPeer(String),

    /// A route with this name is already registered.
    #[display("Route '{}' is already registered", _0)]
    DuplicateRoute(String),

    /// A required route argument was not supplied.
    #[display("Missing argument '{}'", _0)]
    MissingArgument(String),

    /// A route argument was supplied but could not be interpreted.
    #[display("Invalid argument '{}': {}", name, message)]
    InvalidArgument {
        /// Argument name.
        name: String,
        /// Why the argument was rejected.
        message: String,
    },

    /// A local route handler failed.
    #[display("Handler failed: {}", _0)]
    Handler(String),

    /// The remote handler reported a failure.
    #[display("Remote handler failed: {}", _0)]
    Remote(String),

    /// The client is not connected to the server.
    #[display("Not connected: {}", _0)]
    NotConnected(String),
}

impl TalkErrorKind {
    /// Check whether the error came from the network rather than from a handler.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Io(_) | Self::Frame(_) | Self::NotConnected(_)
        )
    }
}

/// Shard-talk error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Talk Error: {} at line {} in {}", kind, line, file)]
pub struct TalkError {
    /// The error kind
    pub kind: TalkErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl TalkError {
    /// Create a new TalkError with automatic location tracking.
    ///
    /// # Examples
    ///
    /// ```
    /// use lion_error::{TalkError, TalkErrorKind};
    ///
    /// let err = TalkError::new(TalkErrorKind::DuplicateRoute("ping".into()));
    /// assert!(format!("{}", err).contains("already registered"));
    /// ```
    #[track_caller]
    pub fn new(kind: TalkErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &TalkErrorKind {
        &self.kind
    }
}

impl From<std::io::Error> for TalkError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        Self::new(TalkErrorKind::Io(e.to_string()))
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for TalkError {
    #[track_caller]
    fn from(e: serde_json::Error) -> Self {
        Self::new(TalkErrorKind::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_is_captured() {
        let err = TalkError::new(TalkErrorKind::Io("reset".into()));
        assert!(err.file.ends_with("talk.rs"));
        assert!(err.line > 0);
    }

    #[test]
    fn test_transport_classification() {
        assert!(TalkErrorKind::Io("eof".into()).is_transport());
        assert!(!TalkErrorKind::Remote("boom".into()).is_transport());
        assert!(!TalkErrorKind::DuplicateRoute("ping".into()).is_transport());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: TalkError = io.into();
        assert!(matches!(err.kind, TalkErrorKind::Io(ref m) if m.contains("refused")));
    }
}
