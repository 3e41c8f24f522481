//! Lion CLI binary.
//!
//! This binary runs the pieces of the shard-talk mesh:
//! - The rendezvous server
//! - A shard peer answering the host routes
//! - One-off requests and directory dumps for debugging

use clap::Parser;
use lion::{ObservabilityConfig, init_observability};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{
        Cli, Commands, handle_call_command, handle_peers_command, load_config, run_peer,
        run_server,
    };

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut logging = ObservabilityConfig::default().with_json_logs(cli.json_logs);
    if cli.verbose {
        logging = logging.with_log_level("debug");
    }
    init_observability(logging)?;

    let config = load_config(cli.config.as_deref())?;

    // Execute the requested command
    match cli.command {
        Commands::Server(endpoint) => {
            run_server(config, endpoint).await?;
        }

        Commands::Peer {
            endpoint,
            appname,
            shard_id,
            shard_count,
        } => {
            run_peer(config, endpoint, appname, shard_id, shard_count).await?;
        }

        Commands::Call {
            peer,
            route,
            args,
            no_wait,
        } => {
            handle_call_command(&config, &peer, &route, args.as_deref(), no_wait).await?;
        }

        Commands::Peers => {
            handle_peers_command(&config).await?;
        }
    }

    Ok(())
}
