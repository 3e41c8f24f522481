//! Direct queries against the rendezvous server.

use crate::transport;
use crate::{Address, Args, DirectoryMap, PeerId, Reply, Request, ServerRoute};
use lion_error::{TalkError, TalkErrorKind, TalkResult};

/// Handle for the server's own routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLink {
    address: Address,
}

impl ServerLink {
    /// Link to the server at `address`.
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Server address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Send one request and wait for the reply.
    pub async fn call(&self, request: &Request) -> TalkResult<Reply> {
        let reply = transport::send_request(&self.address, request, true).await?;
        Ok(reply.unwrap_or(Reply::Empty))
    }

    async fn route(&self, route: ServerRoute, args: Args) -> TalkResult<Reply> {
        self.call(&Request::new(route.as_ref(), args)).await
    }

    /// Liveness check.
    pub async fn ping(&self) -> TalkResult<String> {
        self.route(ServerRoute::Ping, Args::new())
            .await?
            .parse_json()?
            .ok_or_else(|| TalkError::new(TalkErrorKind::Frame("empty ping reply".to_string())))
    }

    /// Registered address of `peer`, if any.
    pub async fn whereis(&self, peer: &PeerId) -> TalkResult<Option<Address>> {
        self.route(ServerRoute::Whereis, Args::new().arg(peer.clone()))
            .await?
            .parse_json()
    }

    /// The server's full directory.
    pub async fn peers(&self) -> TalkResult<DirectoryMap> {
        Ok(self
            .route(ServerRoute::Peers, Args::new())
            .await?
            .parse_json()?
            .unwrap_or_default())
    }
}
