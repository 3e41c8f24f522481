//! Shard-talk: peer discovery and route-based RPC between LionBot processes.
//!
//! A single [`AppServer`] holds the authoritative directory of live peers.
//! Every process runs an [`AppClient`] that registers with the server, keeps a
//! local copy of the directory in sync, answers inbound route calls and sends
//! calls to other peers.
//!
//! ## Wire protocol
//!
//! Each exchange uses its own TCP connection carrying length-delimited frames
//! (see [`transport`]). The caller writes one JSON [`Request`] frame and
//! half-closes; the receiver answers with one tagged [`Reply`] frame, or with
//! nothing for an unknown route. Registration is the one long-lived
//! connection: the server holds it open and treats its end as the peer leaving.
//!
//! ## Routes
//!
//! ```no_run
//! use lion_talk::{AppClient, Args, PeerId, PeerSettingsBuilder, Address, TalkResult};
//!
//! async fn status(_args: Args) -> TalkResult<String> {
//!     Ok("ready".to_string())
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AppClient::new(
//!     PeerSettingsBuilder::default()
//!         .appid("leo_01_00")
//!         .basename("leo")
//!         .address(Address::new("127.0.0.1", 0))
//!         .server_address(Address::new("127.0.0.1", 5000))
//!         .build()?,
//! )?;
//! let status = client.register_route("status", status)?;
//! client.connect().await?;
//!
//! // Locally, in-process.
//! assert_eq!(status.payload(Args::new()).await?, "ready");
//! // On another peer.
//! let remote = status.payload(Args::new()).call(&client, &PeerId::from("leo_01_01")).await?;
//! println!("{remote:?}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod address;
mod client;
mod codec;
mod config;
mod directory;
mod health;
mod link;
mod route;
mod server;
pub mod transport;
mod wire;

pub use address::{Address, PeerId};
pub use client::{
    AppClient, DROP_PEER, NEW_PEER, PEER_LIST, PeerSettings, PeerSettingsBuilder,
    PeerSettingsBuilderError,
};
pub use codec::{Codec, JsonCodec, RawCodec};
pub use config::{PeerConfig, ReconnectPolicy, TalkConfig};
pub use directory::{DirectoryMap, PeerDirectory};
pub use health::{ConnectionState, Health, HealthSnapshot};
pub use link::ServerLink;
pub use route::{Payload, Route, RouteRegistry};
pub use server::{AppServer, ServerRoute};
pub use wire::{Args, Reply, Request};

pub use lion_error::{TalkError, TalkErrorKind, TalkResult};
