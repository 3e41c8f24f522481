//! Test utilities for shard-talk integration tests.
//!
//! Everything binds ephemeral ports on localhost, and clients retry the
//! server every few milliseconds instead of every thirty seconds.

#![allow(dead_code)]

use lion_talk::{
    Address, AppClient, AppServer, PeerId, PeerSettingsBuilder, ReconnectPolicy,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{Instant, sleep};

/// Start a server on a free port and return it with its address.
pub async fn start_server() -> (AppServer, Address) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = Address::from(listener.local_addr().unwrap());
    let server = AppServer::new();
    let serving = server.clone();
    tokio::spawn(async move { serving.serve(listener).await });
    (server, address)
}

/// A port nothing is listening on, at least for the moment.
pub async fn free_address() -> Address {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    Address::from(listener.local_addr().unwrap())
}

/// Build an unconnected client for `appid` that talks to `server`.
pub fn client(appid: &str, basename: &str, server: &Address) -> AppClient {
    let settings = PeerSettingsBuilder::default()
        .appid(appid)
        .basename(basename)
        .address(Address::new("127.0.0.1", 0))
        .server_address(server.clone())
        .reconnect(ReconnectPolicy::new(
            Duration::from_millis(50),
            Duration::from_millis(10),
        ))
        .build()
        .unwrap();
    AppClient::new(settings).unwrap()
}

/// Build a client and connect it.
pub async fn connected(appid: &str, basename: &str, server: &Address) -> AppClient {
    let client = client(appid, basename, server);
    client.connect().await.unwrap();
    client
}

/// Poll `check` until it holds, panicking after five seconds.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        sleep(Duration::from_millis(20)).await;
    }
}

/// Shorthand for a peer identifier.
pub fn peer(id: &str) -> PeerId {
    PeerId::from(id)
}
