//! `lion server`: run the rendezvous server.

use super::Endpoint;
use lion::{Address, AppServer, LionResult, TalkConfig};

/// Run the server until Ctrl+C.
pub async fn run_server(config: TalkConfig, endpoint: Endpoint) -> LionResult<()> {
    let address = Address::new(
        endpoint.host.unwrap_or(config.server.host),
        endpoint.port.unwrap_or(config.server.port),
    );
    tracing::info!(%address, "Starting shard-talk server");

    let server = AppServer::new();
    let serving = server.clone();
    let mut task = tokio::spawn(async move { serving.start(&address).await });

    tokio::select! {
        result = &mut task => {
            return match result {
                Ok(outcome) => Ok(outcome?),
                Err(e) => Err(lion::TalkError::new(lion::TalkErrorKind::Io(e.to_string())).into()),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            server.shutdown();
        }
    }

    if let Ok(Err(e)) = task.await {
        tracing::warn!(error = %e, "Server stopped with an error");
    }
    Ok(())
}
