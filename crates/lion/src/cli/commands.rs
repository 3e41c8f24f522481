//! CLI command definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Lion - LionBot shard-talk server and peer launcher
#[derive(Parser, Debug)]
#[command(name = "lion")]
#[command(about = "Shard-talk rendezvous server, shard peer and debugging tools", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the layered lion.toml lookup)
    #[arg(short, long, global = true, env = "LION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the rendezvous server
    Server(Endpoint),

    /// Run one shard peer
    Peer {
        /// Listener address overrides
        #[command(flatten)]
        endpoint: Endpoint,

        /// Application name shared by every shard
        #[arg(long)]
        appname: Option<String>,

        /// This shard's number
        #[arg(long)]
        shard_id: Option<u32>,

        /// Total number of shards
        #[arg(long)]
        shard_count: Option<u32>,
    },

    /// Send one request to a peer
    Call {
        /// Peer identifier, e.g. leo_01_00
        peer: String,

        /// Route name
        route: String,

        /// Arguments as JSON: an array for positional, an object for keyword
        #[arg(long)]
        args: Option<String>,

        /// Do not wait for the reply
        #[arg(long)]
        no_wait: bool,
    },

    /// Print the server's peer directory
    Peers,
}

/// Host and port overrides
#[derive(Args, Debug, Clone, Default)]
pub struct Endpoint {
    /// Host to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,
}
