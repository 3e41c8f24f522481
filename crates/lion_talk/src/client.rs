//! Per-process shard-talk peer.

use crate::transport::{self, FramedStream};
use crate::{
    Address, Args, Codec, ConnectionState, DirectoryMap, Health, HealthSnapshot, PeerDirectory,
    PeerId, ReconnectPolicy, Reply, Request, Route, RouteRegistry, ServerLink, ServerRoute,
    TalkConfig,
};
use futures::future::join_all;
use lion_error::{TalkError, TalkErrorKind, TalkResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Route the server calls when a peer joins.
pub const NEW_PEER: &str = "new_peer";
/// Route the server calls when a peer leaves.
pub const DROP_PEER: &str = "drop_peer";
/// Route that replaces the whole directory.
pub const PEER_LIST: &str = "peer_list";

/// Identity and endpoints of one peer.
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder, derive_getters::Getters)]
#[builder(setter(into))]
pub struct PeerSettings {
    /// Identifier this peer registers under.
    appid: PeerId,
    /// Prefix shared by sibling shards of the same application.
    basename: String,
    /// Listener address to bind and advertise.
    address: Address,
    /// Rendezvous server address.
    server_address: Address,
    /// Delay between server connection attempts.
    #[builder(default)]
    reconnect: ReconnectPolicy,
}

impl PeerSettings {
    /// Settings for the shard described by a loaded configuration.
    pub fn from_config(config: &TalkConfig) -> Self {
        Self {
            appid: config.peer.peer_id(),
            basename: config.peer.appname.clone(),
            address: config.peer.address(),
            server_address: config.server.clone(),
            reconnect: config.reconnect,
        }
    }
}

/// One process's presence in the shard-talk mesh.
///
/// Owns a route registry, a cached peer directory and a listener for inbound
/// requests. Cloning is cheap and shares all state. Dropping the last handle
/// has the same effect as [`close`](Self::close).
///
/// # Example
///
/// ```no_run
/// use lion_talk::{AppClient, Args, PeerSettingsBuilder, TalkResult};
///
/// async fn ping(_args: Args) -> TalkResult<String> {
///     Ok("Pong!".to_string())
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = PeerSettingsBuilder::default()
///     .appid("leo_02_00")
///     .basename("leo")
///     .address(lion_talk::Address::new("127.0.0.1", 5001))
///     .server_address(lion_talk::Address::new("127.0.0.1", 5000))
///     .build()?;
/// let client = AppClient::new(settings)?;
/// let ping = client.register_route("ping", ping)?;
/// client.connect().await?;
///
/// let replies = ping.payload(Args::new()).broadcast(&client, true, true).await;
/// println!("{} siblings answered", replies.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AppClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    settings: PeerSettings,
    advertised: OnceLock<Address>,
    directory: PeerDirectory,
    routes: RouteRegistry,
    health: Health,
    shutdown: CancellationToken,
}

async fn new_peer(directory: PeerDirectory, args: Args) -> TalkResult<()> {
    let appid: PeerId = args.get(0, "appid")?;
    let address: Address = args.get(1, "address")?;
    debug!(peer = %appid, %address, "Adding peer");
    directory.insert(appid, address);
    Ok(())
}

async fn drop_peer(directory: PeerDirectory, args: Args) -> TalkResult<()> {
    let appid: PeerId = args.get(0, "appid")?;
    debug!(peer = %appid, "Dropping peer");
    directory.remove(&appid);
    Ok(())
}

async fn peer_list(directory: PeerDirectory, args: Args) -> TalkResult<()> {
    let peers: DirectoryMap = args.get(0, "peers")?;
    debug!(count = peers.len(), "Replacing peer list");
    directory.replace(peers);
    Ok(())
}

impl AppClient {
    /// Create a client and register the directory-maintenance routes.
    ///
    /// The directory starts out containing only this peer.
    pub fn new(settings: PeerSettings) -> TalkResult<Self> {
        let mut seed = DirectoryMap::new();
        seed.insert(settings.appid.clone(), settings.address.clone());
        let directory = PeerDirectory::from_map(seed);
        let routes = RouteRegistry::new();

        let d = directory.clone();
        routes.register(NEW_PEER, move |args| new_peer(d.clone(), args))?;
        let d = directory.clone();
        routes.register(DROP_PEER, move |args| drop_peer(d.clone(), args))?;
        let d = directory.clone();
        routes.register(PEER_LIST, move |args| peer_list(d.clone(), args))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                settings,
                advertised: OnceLock::new(),
                directory,
                routes,
                health: Health::new(),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Create a client from a loaded configuration.
    pub fn from_config(config: &TalkConfig) -> TalkResult<Self> {
        Self::new(PeerSettings::from_config(config))
    }

    /// This peer's identifier.
    pub fn appid(&self) -> &PeerId {
        &self.inner.settings.appid
    }

    /// Prefix identifying sibling shards.
    pub fn basename(&self) -> &str {
        &self.inner.settings.basename
    }

    /// Address advertised to other peers; the configured one until `connect`.
    pub fn address(&self) -> Address {
        self.inner
            .advertised
            .get()
            .cloned()
            .unwrap_or_else(|| self.inner.settings.address.clone())
    }

    /// Settings this client was built with.
    pub fn settings(&self) -> &PeerSettings {
        &self.inner.settings
    }

    /// The route registry.
    pub fn routes(&self) -> &RouteRegistry {
        &self.inner.routes
    }

    /// The cached peer directory.
    pub fn directory(&self) -> &PeerDirectory {
        &self.inner.directory
    }

    /// Every known peer.
    pub fn peers(&self) -> DirectoryMap {
        self.inner.directory.snapshot()
    }

    /// Known peers sharing this client's basename.
    pub fn my_peers(&self) -> DirectoryMap {
        self.inner.directory.filtered(self.basename())
    }

    /// Current health counters.
    pub fn health(&self) -> HealthSnapshot {
        self.inner.health.snapshot()
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.health.subscribe()
    }

    /// Handle for querying the rendezvous server directly.
    pub fn server(&self) -> ServerLink {
        ServerLink::new(self.inner.settings.server_address.clone())
    }

    /// Ask the server whether it is alive.
    pub async fn ping_server(&self) -> TalkResult<String> {
        self.server().ping().await
    }

    /// Ask the server where `peer` listens.
    pub async fn whereis(&self, peer: &PeerId) -> TalkResult<Option<Address>> {
        self.server().whereis(peer).await
    }

    /// The server's authoritative directory.
    pub async fn server_peers(&self) -> TalkResult<DirectoryMap> {
        self.server().peers().await
    }

    /// Register a JSON-coded route.
    ///
    /// # Errors
    ///
    /// Fails if a route with this name already exists.
    pub fn register_route<T, F, Fut>(&self, name: impl Into<String>, handler: F) -> TalkResult<Route<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TalkResult<T>> + Send + 'static,
    {
        self.inner.routes.register(name, handler)
    }

    /// Register a route with an explicit codec.
    pub fn register_route_with_codec<T, C, F, Fut>(
        &self,
        name: impl Into<String>,
        codec: C,
        handler: F,
    ) -> TalkResult<Route<T>>
    where
        T: Send + 'static,
        C: Codec<T>,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TalkResult<T>> + Send + 'static,
    {
        self.inner.routes.register_with_codec(name, codec, handler)
    }

    /// Bind the configured listener, then join the mesh.
    ///
    /// # Errors
    ///
    /// Fails only if the listener cannot be bound. Server unavailability is
    /// logged and retried in the background.
    pub async fn connect(&self) -> TalkResult<()> {
        let address = &self.inner.settings.address;
        let listener = TcpListener::bind((address.host.as_str(), address.port))
            .await
            .map_err(|e| {
                TalkError::new(TalkErrorKind::Bind {
                    address: address.to_string(),
                    message: e.to_string(),
                })
            })?;
        self.connect_with(listener).await
    }

    /// Join the mesh using an already-bound listener.
    ///
    /// Starts serving inbound requests first, makes one registration attempt,
    /// then supervises the keepalive and reconnects in the background.
    #[instrument(skip(self, listener), fields(appid = %self.appid()))]
    pub async fn connect_with(&self, listener: TcpListener) -> TalkResult<()> {
        let configured = &self.inner.settings.address;
        let local = listener.local_addr()?;
        let advertised = if configured.port == 0 {
            configured.with_port(local.port())
        } else {
            configured.clone()
        };
        if self.inner.advertised.set(advertised.clone()).is_err() {
            return Err(TalkError::new(TalkErrorKind::Bind {
                address: advertised.to_string(),
                message: "client is already listening".to_string(),
            }));
        }
        self.inner
            .directory
            .insert(self.appid().clone(), advertised.clone());

        info!(address = %advertised, "Serving on {}", advertised);
        let span = info_span!("listener", appid = %self.appid());
        tokio::spawn(
            Self::accept_loop(
                self.inner.routes.clone(),
                self.inner.shutdown.clone(),
                listener,
            )
            .instrument(span),
        );

        let first = self.register().await;
        let span = info_span!("keepalive", appid = %self.appid());
        tokio::spawn(Self::supervise(Arc::downgrade(&self.inner), first).instrument(span));
        Ok(())
    }

    /// Stop serving and drop the server connection.
    ///
    /// The server notices the closed registration and tells the other peers.
    pub fn close(&self) {
        info!(appid = %self.appid(), "Closing shard-talk client");
        self.inner.shutdown.cancel();
        self.inner.health.set_state(ConnectionState::Disconnected);
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    async fn register(&self) -> TalkResult<FramedStream> {
        self.inner.health.record_attempt();
        let server = &self.inner.settings.server_address;
        let mut framed = transport::connect(server).await?;

        let request = Request::new(
            ServerRoute::Connect.as_ref(),
            Args::new()
                .kwarg("appid", self.appid().clone())
                .kwarg("address", self.address()),
        );
        transport::send_frame(&mut framed, request.to_bytes()?).await?;

        let peers: DirectoryMap = transport::read_reply(&mut framed)
            .await?
            .parse_json()?
            .ok_or_else(|| {
                TalkError::new(TalkErrorKind::NotConnected(
                    "server closed before sending the peer list".to_string(),
                ))
            })?;
        debug!(count = peers.len(), "Received peer list");
        self.inner.directory.replace(peers);
        self.inner.health.record_connected();
        Ok(framed)
    }

    async fn supervise(client: Weak<ClientInner>, first: TalkResult<FramedStream>) {
        let Some((shutdown, health, policy)) = client.upgrade().map(|inner| {
            (
                inner.shutdown.clone(),
                inner.health.clone(),
                inner.settings.reconnect,
            )
        }) else {
            return;
        };
        let mut attempt = first;
        loop {
            match attempt {
                Ok(framed) => {
                    debug!("Connected to the registry server, launching keepalive.");
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        result = transport::wait_for_close(framed) => match result {
                            Ok(()) => info!("Lost connection to address server. Reconnecting..."),
                            Err(e) => warn!(error = %e, "Lost connection to address server. Reconnecting..."),
                        },
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Could not connect to registry server. Trying again later.");
                }
            }

            health.set_state(ConnectionState::Reconnecting);
            let delay = policy.delay();
            debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnecting");
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = sleep(delay) => {}
            }

            // Every client handle is gone once the upgrade fails.
            let Some(inner) = client.upgrade() else {
                return;
            };
            let live = AppClient { inner };
            attempt = tokio::select! {
                _ = shutdown.cancelled() => return,
                result = live.register() => result,
            };
        }
    }

    async fn accept_loop(
        routes: RouteRegistry,
        shutdown: CancellationToken,
        listener: TcpListener,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Listener stopped");
                    return;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let routes = routes.clone();
                        let span = info_span!("serve", %remote);
                        tokio::spawn(Self::handle_request(routes, stream).instrument(span));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }
    }

    async fn handle_request(routes: RouteRegistry, stream: TcpStream) {
        let mut framed = transport::frame(stream);
        let request = match transport::read_request(&mut framed).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("Connection closed before a request arrived");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Could not read request");
                return;
            }
        };

        debug!(
            route = %request.route,
            args = ?request.args.args,
            kwargs = ?request.args.kwargs,
            "Handling request"
        );

        let outcome = match routes.dispatch(request).await {
            Some(reply) => transport::write_reply(&mut framed, &reply).await,
            None => transport::finish(&mut framed).await,
        };
        if let Err(e) = outcome {
            debug!(error = %e, "Caller went away before the reply was written");
        }
    }

    /// Send one request to a peer.
    ///
    /// An unknown peer or failed exchange is logged and yields `None`, as does
    /// a successful fire-and-forget send.
    #[instrument(skip(self, request), fields(appid = %self.appid(), route = %request.route))]
    pub async fn request(
        &self,
        peer: &PeerId,
        request: &Request,
        wait_for_reply: bool,
    ) -> Option<Reply> {
        match self.try_request(peer, request, wait_for_reply).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Failed to send request to {}", peer);
                None
            }
        }
    }

    /// Send one request to a peer, returning transport errors.
    pub async fn try_request(
        &self,
        peer: &PeerId,
        request: &Request,
        wait_for_reply: bool,
    ) -> TalkResult<Option<Reply>> {
        let address = self
            .inner
            .directory
            .get(peer)
            .ok_or_else(|| TalkError::new(TalkErrorKind::UnknownPeer(peer.to_string())))?;
        debug!(%peer, %address, "Sending request");
        transport::send_request(&address, request, wait_for_reply).await
    }

    /// Send one request to many peers concurrently.
    ///
    /// `only_my_peers` restricts targets to sibling shards; `except_self`
    /// skips this peer. Every target appears in the result, with its failure
    /// if delivery failed.
    #[instrument(skip(self, request), fields(appid = %self.appid(), route = %request.route))]
    pub async fn requestall(
        &self,
        request: &Request,
        except_self: bool,
        only_my_peers: bool,
    ) -> HashMap<PeerId, TalkResult<Reply>> {
        let peers = if only_my_peers {
            self.my_peers()
        } else {
            self.peers()
        };
        let targets: Vec<PeerId> = peers
            .into_keys()
            .filter(|peer| !(except_self && peer == self.appid()))
            .collect();
        debug!(count = targets.len(), "Broadcasting request");

        let results = join_all(
            targets
                .iter()
                .map(|peer| self.try_request(peer, request, true)),
        )
        .await;

        targets
            .into_iter()
            .zip(results)
            .map(|(peer, result)| {
                if let Err(e) = &result {
                    warn!(%peer, error = %e, "Broadcast delivery failed");
                }
                (peer, result.map(|reply| reply.unwrap_or(Reply::Empty)))
            })
            .collect()
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.health.set_state(ConnectionState::Disconnected);
    }
}
