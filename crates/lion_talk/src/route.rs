//! Named routes and the registry that dispatches them.
//!
//! A [`Route`] is both a local async function and a description of a remote
//! call: `route.payload(args)` can be awaited to run the handler in-process,
//! or sent to one or many peers through an [`AppClient`](crate::AppClient).

use crate::transport::MAX_FRAME_LENGTH;
use crate::{AppClient, Args, Codec, JsonCodec, PeerId, Reply, Request};
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use lion_error::{TalkError, TalkErrorKind, TalkResult};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::IntoFuture;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

type Handler<T> = dyn Fn(Args) -> BoxFuture<'static, TalkResult<T>> + Send + Sync;

/// A named, remotely callable async handler with its result codec.
pub struct Route<T> {
    name: Arc<str>,
    handler: Arc<Handler<T>>,
    codec: Arc<dyn Codec<T>>,
}

impl<T> Clone for Route<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            handler: Arc::clone(&self.handler),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<T> std::fmt::Debug for Route<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route").field("name", &self.name).finish()
    }
}

impl<T: Send + 'static> Route<T> {
    /// Create a route whose result is carried as JSON.
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TalkResult<T>> + Send + 'static,
    {
        Self::with_codec(name, JsonCodec, handler)
    }

    /// Create a route with an explicit result codec.
    pub fn with_codec<C, F, Fut>(name: impl Into<String>, codec: C, handler: F) -> Self
    where
        C: Codec<T>,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TalkResult<T>> + Send + 'static,
    {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            handler: Arc::new(move |args| handler(args).boxed()),
            codec: Arc::new(codec),
        }
    }

    /// Route name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler in-process.
    pub fn execute(&self, args: Args) -> BoxFuture<'static, TalkResult<T>> {
        (self.handler)(args)
    }

    /// Bind arguments, producing something that can be awaited locally or sent.
    pub fn payload(&self, args: Args) -> Payload<T> {
        Payload {
            route: self.clone(),
            args,
        }
    }

    /// Encode a result with this route's codec.
    pub fn encode(&self, value: &T) -> TalkResult<Bytes> {
        self.codec.encode(value)
    }

    /// Interpret a reply from a peer that ran this route.
    #[track_caller]
    pub fn decode(&self, reply: &Reply) -> TalkResult<Option<T>> {
        match reply {
            Reply::Empty => Ok(None),
            Reply::Value(bytes) => self.codec.decode(bytes).map(Some),
            Reply::Error(message) => Err(TalkError::new(TalkErrorKind::Remote(message.clone()))),
        }
    }

    /// Run the handler for an inbound request and encode the outcome.
    ///
    /// Failures and panics are logged with the full argument context and
    /// reported as [`Reply::Error`], as is a result too large for one frame.
    pub async fn reply(&self, args: Args) -> Reply {
        let context = args.clone();
        let outcome = AssertUnwindSafe(self.execute(args)).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                error!(
                    route = %self.name,
                    args = ?context.args,
                    kwargs = ?context.kwargs,
                    "Route handler panicked"
                );
                return Reply::Error(format!("route '{}' panicked", self.name));
            }
        };

        match result.and_then(|value| self.encode(&value)) {
            Ok(bytes) if bytes.is_empty() => Reply::Empty,
            Ok(bytes) if bytes.len() >= MAX_FRAME_LENGTH => {
                error!(
                    route = %self.name,
                    len = bytes.len(),
                    limit = MAX_FRAME_LENGTH - 1,
                    "Route result exceeds frame limit"
                );
                Reply::Error(format!(
                    "reply of {} bytes exceeds frame limit of {} bytes",
                    bytes.len(),
                    MAX_FRAME_LENGTH - 1
                ))
            }
            Ok(bytes) => Reply::Value(bytes),
            Err(e) => {
                error!(
                    route = %self.name,
                    args = ?context.args,
                    kwargs = ?context.kwargs,
                    error = %e,
                    "Exception occurred running route"
                );
                Reply::Error(e.kind.to_string())
            }
        }
    }
}

/// A route bound to arguments.
///
/// Awaiting a payload runs the handler locally, bypassing the network.
///
/// # Examples
///
/// ```
/// use lion_talk::{Args, Route, TalkResult};
///
/// async fn double(args: Args) -> TalkResult<i64> {
///     let n: i64 = args.get(0, "n")?;
///     Ok(n * 2)
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let double = Route::new("double", double);
///
/// assert_eq!(double.payload(Args::new().arg(21)).await?, 42);
/// # Ok(())
/// # }
/// ```
pub struct Payload<T> {
    route: Route<T>,
    args: Args,
}

impl<T> std::fmt::Debug for Payload<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("route", &self.route.name)
            .field("args", &self.args)
            .finish()
    }
}

impl<T: Send + 'static> Payload<T> {
    /// The route this payload calls.
    pub fn route(&self) -> &Route<T> {
        &self.route
    }

    /// Bound arguments.
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Wire request for this payload.
    pub fn request(&self) -> Request {
        Request::new(self.route.name(), self.args.clone())
    }

    /// Send to one peer and wait for the raw reply. `None` if delivery failed.
    pub async fn send(&self, client: &AppClient, peer: &PeerId) -> Option<Reply> {
        client.request(peer, &self.request(), true).await
    }

    /// Send to one peer without waiting for the handler to finish.
    pub async fn send_forget(&self, client: &AppClient, peer: &PeerId) {
        client.request(peer, &self.request(), false).await;
    }

    /// Send to one peer and decode the reply with this route's codec.
    pub async fn call(&self, client: &AppClient, peer: &PeerId) -> TalkResult<Option<T>> {
        let reply = client.try_request(peer, &self.request(), true).await?;
        self.route.decode(&reply.unwrap_or(Reply::Empty))
    }

    /// Send to every known peer. See [`AppClient::requestall`].
    pub async fn broadcast(
        &self,
        client: &AppClient,
        except_self: bool,
        only_my_peers: bool,
    ) -> HashMap<PeerId, TalkResult<Reply>> {
        client
            .requestall(&self.request(), except_self, only_my_peers)
            .await
    }
}

impl<T: Send + 'static> IntoFuture for Payload<T> {
    type Output = TalkResult<T>;
    type IntoFuture = BoxFuture<'static, TalkResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.route.execute(self.args)
    }
}

trait Dispatch: Send + Sync {
    fn run(&self, args: Args) -> BoxFuture<'static, Reply>;
}

impl<T: Send + 'static> Dispatch for Route<T> {
    fn run(&self, args: Args) -> BoxFuture<'static, Reply> {
        let route = self.clone();
        async move { route.reply(args).await }.boxed()
    }
}

/// Instance-owned map of route name to handler.
///
/// Cloning shares the underlying map, so a client and the tasks it spawns see
/// the same routes.
#[derive(Clone, Default)]
pub struct RouteRegistry {
    routes: Arc<RwLock<HashMap<String, Arc<dyn Dispatch>>>>,
}

impl std::fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("routes", &self.names())
            .finish()
    }
}

impl RouteRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a JSON-coded handler under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TalkErrorKind::DuplicateRoute`] if `name` is taken.
    pub fn register<T, F, Fut>(&self, name: impl Into<String>, handler: F) -> TalkResult<Route<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TalkResult<T>> + Send + 'static,
    {
        self.insert(Route::new(name, handler))
    }

    /// Register a handler with an explicit codec.
    pub fn register_with_codec<T, C, F, Fut>(
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
        self.insert(Route::with_codec(name, codec, handler))
    }

    /// Add an already-built route.
    #[instrument(skip(self, route), fields(route = route.name()))]
    pub fn insert<T: Send + 'static>(&self, route: Route<T>) -> TalkResult<Route<T>> {
        let mut routes = self.routes.write();
        if routes.contains_key(route.name()) {
            warn!("Route already registered, rejecting");
            return Err(TalkError::new(TalkErrorKind::DuplicateRoute(
                route.name().to_string(),
            )));
        }
        debug!("Registering route");
        routes.insert(route.name().to_string(), Arc::new(route.clone()));
        Ok(route)
    }

    /// Whether a route is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.routes.read().contains_key(name)
    }

    /// Registered route names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// Whether no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// Run the named route.
    ///
    /// An unknown route is logged and yields `None`; the caller is sent nothing.
    pub async fn dispatch(&self, request: Request) -> Option<Reply> {
        let route = self.routes.read().get(&request.route).cloned();
        match route {
            Some(route) => Some(route.run(request.args).await),
            None => {
                warn!(route = %request.route, "Received unknown route. Ignoring.");
                None
            }
        }
    }
}
