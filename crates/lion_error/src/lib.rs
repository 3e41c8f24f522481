//! Error types for the LionBot workspace.
//!
//! This crate provides the foundation error types used by the shard-talk
//! messaging layer and the `lion` binary.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use lion_error::{LionResult, TalkError, TalkErrorKind};
//!
//! fn find_peer() -> LionResult<String> {
//!     Err(TalkError::new(TalkErrorKind::UnknownPeer("lion_01_00".into())))?
//! }
//!
//! match find_peer() {
//!     Ok(peer) => println!("Got: {}", peer),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod talk;

pub use config::{ConfigError, ConfigErrorKind};
pub use error::{LionError, LionErrorKind, LionResult};
pub use talk::{TalkError, TalkErrorKind, TalkResult};
