//! Liveness signal for a client's connection to the rendezvous server.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Where a client is in its server-connection lifecycle.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    /// Not started, or closed.
    Disconnected,
    /// Dialling and registering with the server.
    Connecting,
    /// Registered; holding the keepalive connection.
    Connected,
    /// Lost the server; waiting out the reconnect delay.
    Reconnecting,
}

/// Point-in-time view of a client's health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct HealthSnapshot {
    /// Current connection state.
    state: ConnectionState,
    /// When the client last registered successfully.
    last_connected_at: Option<DateTime<Utc>>,
    /// Registration attempts made, successful or not.
    attempts: u64,
    /// Successful registrations.
    registrations: u64,
}

/// Shared health tracker updated by the client's supervisor task.
#[derive(Debug, Clone)]
pub struct Health {
    inner: Arc<HealthInner>,
}

#[derive(Debug)]
struct HealthInner {
    state: watch::Sender<ConnectionState>,
    last_connected_at: Mutex<Option<DateTime<Utc>>>,
    attempts: AtomicU64,
    registrations: AtomicU64,
}

impl Default for Health {
    fn default() -> Self {
        Self::new()
    }
}

impl Health {
    /// Creates a tracker in the `Disconnected` state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(HealthInner {
                state,
                last_connected_at: Mutex::new(None),
                attempts: AtomicU64::new(0),
                registrations: AtomicU64::new(0),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.inner.state.send_replace(state);
    }

    pub(crate) fn record_attempt(&self) {
        self.inner.attempts.fetch_add(1, Ordering::Relaxed);
        self.set_state(ConnectionState::Connecting);
    }

    pub(crate) fn record_connected(&self) {
        self.inner.registrations.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_connected_at.lock() = Some(Utc::now());
        self.set_state(ConnectionState::Connected);
    }

    /// Copy of the current counters and state.
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state(),
            last_connected_at: *self.inner.last_connected_at.lock(),
            attempts: self.inner.attempts.load(Ordering::Relaxed),
            registrations: self.inner.registrations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_records_timestamp() {
        let health = Health::new();
        assert_eq!(health.state(), ConnectionState::Disconnected);
        assert!(health.snapshot().last_connected_at().is_none());

        health.record_attempt();
        assert_eq!(health.state(), ConnectionState::Connecting);
        health.record_connected();

        let snapshot = health.snapshot();
        assert_eq!(*snapshot.state(), ConnectionState::Connected);
        assert_eq!(*snapshot.attempts(), 1);
        assert_eq!(*snapshot.registrations(), 1);
        assert!(snapshot.last_connected_at().is_some());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }
}
