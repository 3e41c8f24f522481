//! Routes every LionBot shard registers on its shard-talk client.

use lion_talk::{AppClient, Args, PeerId, Reply, Route, TalkResult};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

/// Capacity of the local event channel.
const EVENT_BUFFER: usize = 64;

/// An event raised on some shard and delivered to this one.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedEvent {
    /// Event name.
    pub name: String,
    /// Event arguments, without the name.
    pub args: Args,
}

async fn handle_ping(_args: Args) -> TalkResult<String> {
    Ok("Pong!".to_string())
}

async fn handle_dispatch(events: broadcast::Sender<DispatchedEvent>, args: Args) -> TalkResult<()> {
    let name: String = args.get(0, "event_name")?;
    let mut rest = args;
    if rest.kwargs.remove("event_name").is_none() && !rest.args.is_empty() {
        rest.args.remove(0);
    }
    info!(event = %name, "Received global dispatch");
    // No local subscribers is not an error.
    let _ = events.send(DispatchedEvent { name, args: rest });
    Ok(())
}

/// Host routes installed on a client.
#[derive(Debug, Clone)]
pub struct HostRoutes {
    ping: Route<String>,
    dispatch: Route<()>,
    events: broadcast::Sender<DispatchedEvent>,
}

impl HostRoutes {
    /// Register `ping` and `dispatch` on `client`.
    pub fn install(client: &AppClient) -> TalkResult<Self> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let ping = client.register_route("ping", handle_ping)?;
        let sender = events.clone();
        let dispatch = client.register_route("dispatch", move |args| {
            handle_dispatch(sender.clone(), args)
        })?;
        Ok(Self {
            ping,
            dispatch,
            events,
        })
    }

    /// The `ping` route.
    pub fn ping(&self) -> &Route<String> {
        &self.ping
    }

    /// The `dispatch` route.
    pub fn dispatch(&self) -> &Route<()> {
        &self.dispatch
    }

    /// Receive events dispatched to this shard.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchedEvent> {
        self.events.subscribe()
    }

    /// Raise `event` on every sibling shard, this one included.
    #[instrument(skip(self, client, args), fields(appid = %client.appid()))]
    pub async fn global_dispatch(
        &self,
        client: &AppClient,
        event: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> HashMap<PeerId, TalkResult<Reply>> {
        let payload = args
            .into_iter()
            .fold(Args::new().arg(event), |payload, value| payload.arg(value));
        let replies = self.dispatch.payload(payload).broadcast(client, false, true).await;
        debug!(
            delivered = replies.values().filter(|r| r.is_ok()).count(),
            total = replies.len(),
            "Global dispatch sent"
        );
        replies
    }
}
