//! Transport layer
//!
//! Supports stdio (default) and streamable HTTP transports

#[cfg(feature = "http")]
mod http;

use std::future::Future;

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;

use crate::config::{TransportConfig, TransportMode};
use crate::dispatch::Dispatcher;
use crate::server::ServerHandler;
use crate::session::ChannelId;
use crate::{Error, Result};

/// Serve MCP over the configured transport until the peer leaves or `shutdown` resolves
pub async fn run_transport(
    dispatcher: Dispatcher,
    config: &TransportConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    match config.mode {
        TransportMode::Stdio => run_stdio(dispatcher, shutdown).await,
        #[cfg(feature = "http")]
        TransportMode::Http => {
            http::run_http(dispatcher, config.http_host, config.http_port, shutdown).await
        }
        #[cfg(not(feature = "http"))]
        TransportMode::Http => Err(Error::Transport(
            "HTTP transport requires the 'http' feature".into(),
        )),
    }
}

/// One process, one caller channel
async fn run_stdio(
    dispatcher: Dispatcher,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let handler = ServerHandler::new(dispatcher, ChannelId::stdio());
    let server = handler
        .serve(stdio())
        .await
        .map_err(|e| Error::Transport(format!("Failed to start stdio transport: {e}")))?;

    tracing::info!("Serving MCP over stdio");

    // Dropping the running service cancels it
    tokio::select! {
        result = server.waiting() => {
            result.map_err(|e| Error::Transport(format!("Stdio transport error: {e}")))?;
        }
        () = shutdown => {
            tracing::info!("Shutdown requested, closing stdio transport");
        }
    }

    Ok(())
}
