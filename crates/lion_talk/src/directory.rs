//! In-memory peer directory.

use crate::{Address, PeerId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Snapshot of a directory, as sent over the wire.
pub type DirectoryMap = HashMap<PeerId, Address>;

/// Mapping of peer identifier to listener address.
///
/// On the server this is the authoritative copy. On clients it is a cache
/// seeded by the registration snapshot and updated by `new_peer` / `drop_peer`
/// deltas. Every mutation is a single locked statement; the lock is never held
/// across an await, and every delta is idempotent.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: Arc<RwLock<DirectoryMap>>,
}

impl PeerDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory seeded with the given entries.
    pub fn from_map(peers: DirectoryMap) -> Self {
        Self {
            peers: Arc::new(RwLock::new(peers)),
        }
    }

    /// Add or overwrite one entry. Returns the previous address, if any.
    pub fn insert(&self, peer: PeerId, address: Address) -> Option<Address> {
        self.peers.write().insert(peer, address)
    }

    /// Remove one entry. Removing an absent peer is a no-op.
    pub fn remove(&self, peer: &PeerId) -> Option<Address> {
        self.peers.write().remove(peer)
    }

    /// Replace the whole directory with a snapshot.
    pub fn replace(&self, peers: DirectoryMap) {
        *self.peers.write() = peers;
    }

    /// Look up a peer's address.
    pub fn get(&self, peer: &PeerId) -> Option<Address> {
        self.peers.read().get(peer).cloned()
    }

    /// Whether the peer is present.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.read().contains_key(peer)
    }

    /// Copy of the current directory.
    pub fn snapshot(&self) -> DirectoryMap {
        self.peers.read().clone()
    }

    /// Entries whose identifier starts with `prefix`.
    pub fn filtered(&self, prefix: &str) -> DirectoryMap {
        self.peers
            .read()
            .iter()
            .filter(|(peer, _)| peer.has_prefix(prefix))
            .map(|(peer, address)| (peer.clone(), address.clone()))
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> Address {
        Address::new("127.0.0.1", port)
    }

    #[test]
    fn test_new_peer_is_idempotent() {
        let directory = PeerDirectory::new();
        directory.insert(PeerId::from("leo_02_00"), addr(5001));
        let once = directory.snapshot();
        directory.insert(PeerId::from("leo_02_00"), addr(5001));
        assert_eq!(directory.snapshot(), once);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_drop_absent_peer_is_noop() {
        let directory = PeerDirectory::new();
        directory.insert(PeerId::from("leo_02_00"), addr(5001));
        assert!(directory.remove(&PeerId::from("leo_02_01")).is_none());
        assert_eq!(directory.len(), 1);
        directory.remove(&PeerId::from("leo_02_00"));
        directory.remove(&PeerId::from("leo_02_00"));
        assert!(directory.is_empty());
    }

    #[test]
    fn test_filtered_keeps_siblings_only() {
        let directory = PeerDirectory::new();
        directory.insert(PeerId::from("leo_02_00"), addr(5001));
        directory.insert(PeerId::from("leo_02_01"), addr(5002));
        directory.insert(PeerId::from("analytics"), addr(5100));

        let siblings = directory.filtered("leo");
        assert_eq!(siblings.len(), 2);
        assert!(!siblings.contains_key(&PeerId::from("analytics")));
    }

    #[test]
    fn test_replace_discards_old_entries() {
        let directory = PeerDirectory::new();
        directory.insert(PeerId::from("stale"), addr(1));

        let mut snapshot = DirectoryMap::new();
        snapshot.insert(PeerId::from("fresh"), addr(2));
        directory.replace(snapshot.clone());

        assert_eq!(directory.snapshot(), snapshot);
        assert!(!directory.contains(&PeerId::from("stale")));
    }
}
