//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the lion binary.

mod call;
mod commands;
mod peer;
mod server;

pub use call::{handle_call_command, handle_peers_command};
pub use commands::{Cli, Commands, Endpoint};
pub use peer::run_peer;
pub use server::run_server;

use lion::{LionResult, TalkConfig};
use std::path::Path;

/// Load the configuration named on the command line, or the layered default.
pub fn load_config(path: Option<&Path>) -> LionResult<TalkConfig> {
    match path {
        Some(path) => TalkConfig::from_file(path),
        None => TalkConfig::load(),
    }
}
