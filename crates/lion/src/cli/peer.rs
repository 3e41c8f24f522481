//! `lion peer`: run one shard's shard-talk client.

use super::Endpoint;
use lion::{AppClient, HostRoutes, LionResult, PeerSettings, TalkConfig};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

/// Event announced to sibling shards once this shard has joined.
const READY_EVENT: &str = "shard_ready";

/// Run a peer until Ctrl+C, logging events dispatched to it.
pub async fn run_peer(
    mut config: TalkConfig,
    endpoint: Endpoint,
    appname: Option<String>,
    shard_id: Option<u32>,
    shard_count: Option<u32>,
) -> LionResult<()> {
    if let Some(host) = endpoint.host {
        config.peer.host = host;
    }
    if let Some(port) = endpoint.port {
        config.peer.port = port;
    }
    if let Some(appname) = appname {
        config.peer.appname = appname;
    }
    if let Some(shard_id) = shard_id {
        config.peer.shard_id = shard_id;
    }
    if let Some(shard_count) = shard_count {
        config.peer.shard_count = shard_count;
    }

    let settings = PeerSettings::from_config(&config);
    tracing::info!(
        appid = %settings.appid(),
        server = %settings.server_address(),
        "Starting shard-talk peer"
    );

    let client = AppClient::new(settings)?;
    let routes = HostRoutes::install(&client)?;
    let mut events = routes.subscribe();
    client.connect().await?;

    let announced = routes
        .global_dispatch(&client, READY_EVENT, [Value::from(client.appid().clone())])
        .await;
    tracing::info!(siblings = announced.len(), "Announced readiness");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => tracing::info!(
                    event = %event.name,
                    args = ?event.args.args,
                    kwargs = ?event.args.kwargs,
                    "Dispatched event"
                ),
                Err(RecvError::Lagged(missed)) => tracing::warn!(missed, "Dropped dispatched events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, leaving the mesh");
                break;
            }
        }
    }

    client.close();
    Ok(())
}
