//! Tests for the routes every shard answers.

use lion::{
    Address, AppClient, AppServer, Args, HostRoutes, PeerId, PeerSettingsBuilder,
    ReconnectPolicy,
};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

async fn start_server() -> Address {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = Address::from(listener.local_addr().unwrap());
    let server = AppServer::new();
    tokio::spawn(async move { server.serve(listener).await });
    address
}

async fn shard(appid: &str, basename: &str, server: &Address) -> (AppClient, HostRoutes) {
    let settings = PeerSettingsBuilder::default()
        .appid(appid)
        .basename(basename)
        .address(Address::new("127.0.0.1", 0))
        .server_address(server.clone())
        .reconnect(ReconnectPolicy::new(Duration::from_millis(50), Duration::ZERO))
        .build()
        .unwrap();
    let client = AppClient::new(settings).unwrap();
    let routes = HostRoutes::install(&client).unwrap();
    client.connect().await.unwrap();
    (client, routes)
}

async fn wait_for_peers(client: &AppClient, count: usize) {
    timeout(Duration::from_secs(5), async {
        while client.peers().len() < count {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_ping_locally_and_remotely() {
    let server = start_server().await;
    let (x, x_routes) = shard("leo_02_00", "leo", &server).await;
    let (_y, _y_routes) = shard("leo_02_01", "leo", &server).await;
    wait_for_peers(&x, 2).await;

    assert_eq!(x_routes.ping().payload(Args::new()).await.unwrap(), "Pong!");
    let remote = x_routes
        .ping()
        .payload(Args::new())
        .call(&x, &PeerId::from("leo_02_01"))
        .await
        .unwrap();
    assert_eq!(remote.as_deref(), Some("Pong!"));
}

#[tokio::test]
async fn test_global_dispatch_reaches_siblings_and_self() {
    let server = start_server().await;
    let (x, x_routes) = shard("leo_02_00", "leo", &server).await;
    let (_y, y_routes) = shard("leo_02_01", "leo", &server).await;
    let (_other, other_routes) = shard("analytics_01_00", "analytics", &server).await;
    wait_for_peers(&x, 3).await;

    let mut x_events = x_routes.subscribe();
    let mut y_events = y_routes.subscribe();
    let mut other_events = other_routes.subscribe();

    let replies = x_routes
        .global_dispatch(&x, "skin_updated", [json!(7)])
        .await;
    assert_eq!(replies.len(), 2);
    assert!(replies.values().all(|r| r.is_ok()));

    for events in [&mut x_events, &mut y_events] {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.name, "skin_updated");
        assert_eq!(event.args.args, vec![json!(7)]);
    }
    assert!(other_events.try_recv().is_err());
}

#[tokio::test]
async fn test_dispatch_requires_event_name() {
    let server = start_server().await;
    let (x, routes) = shard("leo_01_00", "leo", &server).await;
    let reply = x
        .request(x.appid(), &routes.dispatch().payload(Args::new()).request(), true)
        .await;
    assert!(matches!(reply, Some(lion::Reply::Error(_))));
}
