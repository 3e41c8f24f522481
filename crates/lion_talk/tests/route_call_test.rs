//! Tests for route calls between peers.

mod test_utils;

use lion_talk::{
    Address, Args, Reply, Request, TalkError, TalkErrorKind, TalkResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use test_utils::{connected, eventually, peer, start_server};
use tokio::time::timeout;

async fn double(args: Args) -> TalkResult<i64> {
    let n: i64 = args.get(0, "n")?;
    Ok(n * 2)
}

async fn nothing(_args: Args) -> TalkResult<()> {
    Ok(())
}

async fn refuse(_args: Args) -> TalkResult<()> {
    Err(TalkError::new(TalkErrorKind::Handler("not today".into())))
}

async fn whoami(args: Args) -> TalkResult<String> {
    args.get(0, "appid")
}

#[tokio::test]
async fn test_call_route_on_other_peer() {
    let (_server, address) = start_server().await;
    let x = connected("leo_02_00", "leo", &address).await;
    let y = connected("leo_02_01", "leo", &address).await;

    eventually("X to learn about Y", || x.peers().len() == 2).await;

    let route = y.register_route("double", double).unwrap();
    let result = route
        .payload(Args::new().arg(21))
        .call(&x, &peer("leo_02_01"))
        .await
        .unwrap();
    assert_eq!(result, Some(42));

    // Same payload, run in-process.
    assert_eq!(route.payload(Args::new().kwarg("n", 5)).await.unwrap(), 10);
}

#[tokio::test]
async fn test_unknown_route_reads_as_empty() {
    let (_server, address) = start_server().await;
    let x = connected("leo_02_00", "leo", &address).await;
    let y = connected("leo_02_01", "leo", &address).await;
    eventually("X to learn about Y", || x.peers().len() == 2).await;

    let reply = x
        .request(&peer("leo_02_01"), &Request::new("missing", Args::new()), true)
        .await;
    assert_eq!(reply, Some(Reply::Empty));
    drop(y);
}

#[tokio::test]
async fn test_empty_result_and_failure_are_distinct() {
    let (_server, address) = start_server().await;
    let x = connected("leo_01_00", "leo", &address).await;
    x.register_route("nothing", nothing).unwrap();
    x.register_route("refuse", refuse).unwrap();

    let me = x.appid().clone();
    let empty = x.request(&me, &Request::new("nothing", Args::new()), true).await;
    let failed = x.request(&me, &Request::new("refuse", Args::new()), true).await;

    assert_eq!(empty, Some(Reply::Empty));
    match failed {
        Some(Reply::Error(message)) => assert!(message.contains("not today")),
        other => panic!("expected an error reply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_to_unknown_peer() {
    let (_server, address) = start_server().await;
    let x = connected("leo_01_00", "leo", &address).await;
    let request = Request::new("double", Args::new().arg(1));

    assert_eq!(x.request(&peer("ghost"), &request, true).await, None);
    let err = x.try_request(&peer("ghost"), &request, true).await.unwrap_err();
    assert!(matches!(err.kind, TalkErrorKind::UnknownPeer(_)));
}

#[tokio::test]
async fn test_fire_and_forget_still_runs_handler() {
    let (_server, address) = start_server().await;
    let x = connected("leo_01_00", "leo", &address).await;

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let route = x
        .register_route("count", move |_args: Args| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), TalkError>(())
            }
        })
        .unwrap();

    route.payload(Args::new()).send_forget(&x, x.appid()).await;
    eventually("the handler to run", || hits.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn test_broadcast_isolates_failed_peers() {
    let (_server, address) = start_server().await;
    let x = connected("leo_03_00", "leo", &address).await;
    let y = connected("leo_03_01", "leo", &address).await;
    let other = connected("analytics", "analytics", &address).await;
    for client in [&x, &y, &other] {
        client.register_route("whoami", whoami).unwrap();
    }
    eventually("X to see everyone", || x.peers().len() == 3).await;

    // A sibling that registered and then stopped listening.
    x.directory()
        .insert(peer("leo_03_02"), Address::new("127.0.0.1", 1));

    let request = Request::new("whoami", Args::new().arg("leo"));
    let replies = x.requestall(&request, true, true).await;

    assert_eq!(replies.len(), 2);
    assert!(!replies.contains_key(x.appid()));
    assert!(!replies.contains_key(&peer("analytics")));
    assert!(matches!(replies[&peer("leo_03_01")], Ok(Reply::Value(_))));
    let err = replies[&peer("leo_03_02")].as_ref().unwrap_err();
    assert!(err.kind.is_transport());

    // The failure does not remove the entry.
    assert!(x.directory().contains(&peer("leo_03_02")));

    let everyone = x.requestall(&request, false, false).await;
    assert_eq!(everyone.len(), 4);
    assert_eq!(everyone.values().filter(|r| r.is_ok()).count(), 3);
}

#[tokio::test]
async fn test_duplicate_route_rejected_on_client() {
    let (_server, address) = start_server().await;
    let x = connected("leo_01_00", "leo", &address).await;
    x.register_route("double", double).unwrap();
    let err = x.register_route("double", double).unwrap_err();
    assert!(matches!(err.kind, TalkErrorKind::DuplicateRoute(_)));
    let err = x.register_route("new_peer", nothing).unwrap_err();
    assert!(matches!(err.kind, TalkErrorKind::DuplicateRoute(_)));
}

#[tokio::test]
async fn test_oversized_result_arrives_as_error() {
    let (_server, address) = start_server().await;
    let x = connected("leo_01_00", "leo", &address).await;
    x.register_route("big", |_args: Args| async {
        Ok::<_, TalkError>("a".repeat(2 * 1024 * 1024))
    })
    .unwrap();

    let me = x.appid().clone();
    let reply = x
        .try_request(&me, &Request::new("big", Args::new()), true)
        .await
        .unwrap();
    match reply {
        Some(Reply::Error(message)) => assert!(message.contains("frame limit")),
        other => panic!("expected an error reply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fire_and_forget_does_not_wait_for_handler() {
    let (_server, address) = start_server().await;
    let x = connected("leo_01_00", "leo", &address).await;
    let route = x
        .register_route("stall", |_args: Args| async {
            futures::future::pending::<()>().await;
            Ok::<(), TalkError>(())
        })
        .unwrap();

    let me = x.appid().clone();
    timeout(Duration::from_secs(2), route.payload(Args::new()).send_forget(&x, &me))
        .await
        .unwrap();
    let forgotten = timeout(
        Duration::from_secs(2),
        x.request(&me, &Request::new("stall", Args::new()), false),
    )
    .await
    .unwrap();
    assert_eq!(forgotten, None);
}
