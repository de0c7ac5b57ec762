//! Streamable HTTP transport

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch::Dispatcher;
use crate::server::ServerHandler;
use crate::session::ChannelId;
use crate::{Error, Result};

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP-only settings read from the environment
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub cors_origin: Option<String>,
}

impl HttpConfig {
    pub fn from_env() -> Self {
        Self {
            cors_origin: std::env::var("MCP_CORS_ORIGIN").ok(),
        }
    }
}

/// Run the HTTP server. Each MCP session gets its own caller channel.
pub async fn run_http(
    dispatcher: Dispatcher,
    host: IpAddr,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = SocketAddr::new(host, port);
    let cancellation_token = CancellationToken::new();

    let http_config = HttpConfig::from_env();
    emit_security_warnings(host, &http_config);

    let session_manager = Arc::new(LocalSessionManager::default());
    let config = StreamableHttpServerConfig {
        cancellation_token: cancellation_token.child_token(),
        ..Default::default()
    };

    let factory_dispatcher = dispatcher.clone();
    let mcp_service = StreamableHttpService::new(
        move || {
            Ok(ServerHandler::new(
                factory_dispatcher.clone(),
                ChannelId::random(),
            ))
        },
        session_manager,
        config,
    );

    #[allow(unused_mut)]
    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler));

    #[cfg(feature = "metrics")]
    {
        app = app.route("/metrics", get(metrics_handler));
    }

    let app = app
        .with_state(dispatcher)
        .nest_service("/mcp", mcp_service)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(build_cors_layer(&http_config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("HTTP server listening on {addr}");

    let shutdown_token = cancellation_token.clone();
    tokio::spawn(async move {
        shutdown.await;
        shutdown_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(cancellation_token.cancelled_owned())
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

fn build_cors_layer(config: &HttpConfig) -> CorsLayer {
    let origin = config
        .cors_origin
        .as_deref()
        .and_then(|o| o.parse::<HeaderValue>().ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CORS_ORIGIN));

    CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

fn emit_security_warnings(host: IpAddr, http_config: &HttpConfig) {
    let is_all_interfaces =
        host == IpAddr::V4(Ipv4Addr::UNSPECIFIED) || host == IpAddr::V6(Ipv6Addr::UNSPECIFIED);

    if is_all_interfaces {
        tracing::warn!(
            "HTTP server binding to all interfaces ({host}). \
             This exposes the server to all network interfaces."
        );
    } else if !host.is_loopback() {
        tracing::warn!(
            "HTTP server binding to non-loopback address ({host}). \
             Ensure network security policies are in place."
        );
    }

    if !host.is_loopback() {
        tracing::warn!(
            "SECURITY WARNING: the HTTP transport performs no authentication. \
             Anyone who can reach {host} can query the database through this server."
        );
    }

    if http_config.cors_origin.is_none() {
        tracing::info!(
            "CORS origin not configured (MCP_CORS_ORIGIN). \
             Using restrictive default: {DEFAULT_CORS_ORIGIN}"
        );
    }
}

async fn health_handler(State(dispatcher): State<Dispatcher>) -> impl IntoResponse {
    let report = dispatcher.health().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn stats_handler(State(dispatcher): State<Dispatcher>) -> impl IntoResponse {
    Json(dispatcher.stats())
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::observability::render_metrics(),
    )
}
