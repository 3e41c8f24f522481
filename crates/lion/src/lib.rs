//! LionBot shard-talk.
//!
//! This crate re-exports the messaging layer for convenience and adds what a
//! running shard needs on top of it: the routes every shard answers and
//! logging setup for the `lion` binary.
//!
//! # Architecture
//!
//! - `lion_error` - Error types
//! - `lion_talk` - Peer directory, route registry, client and server
//! - `lion` - Host routes, logging, CLI
//!
//! # Cargo Features
//!
//! - `observability` - Export tracing spans through OpenTelemetry (stdout)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use lion_error::*;
pub use lion_talk::*;

pub mod observability;
mod routes;

pub use observability::{ObservabilityConfig, init_observability};
pub use routes::{DispatchedEvent, HostRoutes};
