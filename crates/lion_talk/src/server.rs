//! The rendezvous server holding the authoritative peer directory.

use crate::client::{DROP_PEER, NEW_PEER};
use crate::transport::{self, FramedStream};
use crate::{Address, Args, DirectoryMap, PeerId, Reply, Request};
use futures::future::join_all;
use lion_error::{TalkError, TalkErrorKind, TalkResult};
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

/// Routes the server answers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum ServerRoute {
    /// Liveness check; replies `"Pong"`.
    Ping,
    /// Look up one peer's address.
    Whereis,
    /// Full directory snapshot.
    Peers,
    /// Register and hold the connection open until the peer leaves.
    Connect,
}

#[derive(Debug, Clone)]
struct Registration {
    address: Address,
    connection: u64,
}

/// Accepts registrations and fans directory changes out to every peer.
///
/// Cloning is cheap and shares the directory.
#[derive(Debug, Clone, Default)]
pub struct AppServer {
    inner: Arc<ServerInner>,
}

#[derive(Debug, Default)]
struct ServerInner {
    clients: Mutex<HashMap<PeerId, Registration>>,
    next_connection: AtomicU64,
    shutdown: CancellationToken,
}

fn request_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

fn registration_args(args: &Args) -> TalkResult<(PeerId, Address)> {
    Ok((args.get(0, "appid")?, args.get(1, "address")?))
}

impl AppServer {
    /// Create a server with an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the registered peers.
    pub fn peers(&self) -> DirectoryMap {
        self.inner
            .clients
            .lock()
            .iter()
            .map(|(peer, registration)| (peer.clone(), registration.address.clone()))
            .collect()
    }

    /// Address of one registered peer.
    pub fn whereis(&self, peer: &PeerId) -> Option<Address> {
        self.inner
            .clients
            .lock()
            .get(peer)
            .map(|registration| registration.address.clone())
    }

    /// Bind `address` and serve until [`shutdown`](Self::shutdown).
    pub async fn start(&self, address: &Address) -> TalkResult<()> {
        let listener = TcpListener::bind((address.host.as_str(), address.port))
            .await
            .map_err(|e| {
                TalkError::new(TalkErrorKind::Bind {
                    address: address.to_string(),
                    message: e.to_string(),
                })
            })?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> TalkResult<()> {
        let local = listener.local_addr()?;
        info!(address = %local, "Serving on {}", local);
        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => {
                    info!("Server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let server = self.clone();
                        let span = info_span!("request", rqid = %request_id(), %remote);
                        tokio::spawn(async move { server.handle_connection(stream).await }.instrument(span));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }
    }

    /// Stop accepting connections and release every held registration.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    async fn handle_connection(&self, stream: TcpStream) {
        let mut framed = transport::frame(stream);
        let request = match transport::read_request(&mut framed).await {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Could not read request");
                return;
            }
        };
        debug!(route = %request.route, "Handling server request");

        let route = match ServerRoute::from_str(&request.route) {
            Ok(route) => route,
            Err(_) => {
                warn!(route = %request.route, "Received unknown route. Ignoring.");
                if let Err(e) = transport::finish(&mut framed).await {
                    debug!(error = %e, "Caller went away");
                }
                return;
            }
        };

        let reply = match route {
            ServerRoute::Ping => Reply::json(&"Pong"),
            ServerRoute::Whereis => self.route_whereis(&request.args),
            ServerRoute::Peers => Reply::json(&self.peers()),
            ServerRoute::Connect => {
                self.client_connection(framed, request.args).await;
                return;
            }
        };

        let reply = reply.unwrap_or_else(|e| {
            warn!(error = %e, route = %route, "Server route failed");
            Reply::Error(e.kind.to_string())
        });
        if let Err(e) = transport::write_reply(&mut framed, &reply).await {
            debug!(error = %e, "Caller went away before the reply was written");
        }
    }

    fn route_whereis(&self, args: &Args) -> TalkResult<Reply> {
        let peer: PeerId = args.get(0, "appid")?;
        match self.whereis(&peer) {
            Some(address) => Reply::json(&address),
            None => Ok(Reply::Empty),
        }
    }

    #[instrument(skip_all, fields(appid))]
    async fn client_connection(&self, mut framed: FramedStream, args: Args) {
        let (appid, address) = match registration_args(&args) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Rejecting malformed registration");
                let reply = Reply::Error(e.kind.to_string());
                if let Err(e) = transport::write_reply(&mut framed, &reply).await {
                    debug!(error = %e, "Caller went away");
                }
                return;
            }
        };
        tracing::Span::current().record("appid", tracing::field::display(&appid));

        let connection = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        let snapshot = {
            let mut clients = self.inner.clients.lock();
            clients.insert(
                appid.clone(),
                Registration {
                    address: address.clone(),
                    connection,
                },
            );
            clients
                .iter()
                .map(|(peer, registration)| (peer.clone(), registration.address.clone()))
                .collect::<DirectoryMap>()
        };
        info!(%address, "Client '{}' connected on {}", appid, address);

        let sent = match Reply::json(&snapshot) {
            Ok(reply) => transport::send_frame(&mut framed, reply.to_bytes()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            warn!(error = %e, "Could not send peer list");
            self.deregister(&appid, connection).await;
            return;
        }

        self.broadcast(
            NEW_PEER,
            Args::new().arg(appid.clone()).arg(address.clone()),
        )
        .await;

        tokio::select! {
            _ = self.inner.shutdown.cancelled() => debug!("Releasing registration on shutdown"),
            result = transport::wait_for_close(framed) => {
                if let Err(e) = result {
                    debug!(error = %e, "Registration connection failed");
                }
            }
        }
        self.deregister(&appid, connection).await;
    }

    async fn deregister(&self, appid: &PeerId, connection: u64) {
        let removed = {
            let mut clients = self.inner.clients.lock();
            match clients.get(appid) {
                Some(current) if current.connection == connection => clients.remove(appid),
                _ => None,
            }
        };
        match removed {
            Some(_) => {
                info!(peer = %appid, "Client '{}' disconnected", appid);
                self.broadcast(DROP_PEER, Args::new().arg(appid.clone())).await;
            }
            None => debug!(peer = %appid, "Registration already superseded"),
        }
    }

    /// Fire a route call at every registered peer concurrently.
    ///
    /// Delivery failures are logged per peer and never remove a peer.
    #[instrument(skip(self, args))]
    pub async fn broadcast(&self, route: &str, args: Args) -> HashMap<PeerId, TalkResult<()>> {
        let request = Request::new(route, args);
        let targets = self.peers();
        debug!(count = targets.len(), "Broadcasting");

        let results = join_all(targets.iter().map(|(peer, address)| {
            let request = &request;
            async move {
                let result = transport::send_request(address, request, false)
                    .await
                    .map(|_| ());
                if let Err(e) = &result {
                    warn!(%peer, error = %e, "Broadcast delivery failed");
                }
                (peer.clone(), result)
            }
        }))
        .await;

        results.into_iter().collect()
    }

    /// Send one request to a registered peer and wait for its reply.
    pub async fn message_peer(&self, peer: &PeerId, request: &Request) -> TalkResult<Reply> {
        let address = self
            .whereis(peer)
            .ok_or_else(|| TalkError::new(TalkErrorKind::UnknownPeer(peer.to_string())))?;
        let reply = transport::send_request(&address, request, true).await?;
        Ok(reply.unwrap_or(Reply::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_route_names() {
        let names: Vec<String> = ServerRoute::iter().map(|r| r.to_string()).collect();
        assert_eq!(names, ["ping", "whereis", "peers", "connect"]);
        assert_eq!(ServerRoute::from_str("whereis").unwrap(), ServerRoute::Whereis);
        assert!(ServerRoute::from_str("new_peer").is_err());
    }

    #[test]
    fn test_request_id_shape() {
        let id = request_id();
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_directory() {
        let server = AppServer::new();
        assert!(server.broadcast(NEW_PEER, Args::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_message_unknown_peer() {
        let server = AppServer::new();
        let err = server
            .message_peer(&PeerId::from("ghost"), &Request::new("ping", Args::new()))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, TalkErrorKind::UnknownPeer(_)));
    }
}
