//! Peer identifiers and network addresses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque name of one process in the shard-talk mesh.
///
/// Bot shards are conventionally named `{appname}_{shard_count:02}_{shard_id:02}`,
/// so every shard of one application shares the `appname` prefix.
///
/// # Examples
///
/// ```
/// use lion_talk::PeerId;
///
/// let peer = PeerId::for_shard("leo", 4, 2);
/// assert_eq!(peer.as_str(), "leo_04_02");
/// assert_eq!(peer.shard_number(), Some(2));
/// assert!(peer.has_prefix("leo"));
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer identifier from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the identifier for one shard of an application.
    pub fn for_shard(appname: &str, shard_count: u32, shard_id: u32) -> Self {
        Self(format!("{appname}_{shard_count:02}_{shard_id:02}"))
    }

    /// Shard number encoded in the final `_` segment, if any.
    pub fn shard_number(&self) -> Option<u32> {
        self.0.rsplit_once('_')?.1.parse().ok()
    }

    /// Whether this identifier belongs to the application named `basename`.
    pub fn has_prefix(&self, basename: &str) -> bool {
        self.0.starts_with(basename)
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<PeerId> for Value {
    fn from(id: PeerId) -> Self {
        Value::String(id.0)
    }
}

/// Where a peer's inbound listener can be reached.
///
/// Immutable once advertised; a peer that moves must re-register.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[display("{}:{}", host, port)]
pub struct Address {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Address {
    /// Create an address from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address with the same host but a different port.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            host: self.host.clone(),
            port,
        }
    }
}

impl From<std::net::SocketAddr> for Address {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl From<Address> for Value {
    fn from(address: Address) -> Self {
        serde_json::json!({ "host": address.host, "port": address.port })
    }
}
