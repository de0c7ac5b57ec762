//! Observability: logging and metrics

#[cfg(feature = "metrics")]
mod metrics;

#[cfg(feature = "metrics")]
pub use metrics::{
    init_metrics, record_pool_error, record_pool_wait_time, record_reconnect, record_rejection,
    record_tool_call, render_metrics, set_pool_stats,
};

use crate::Result;
use crate::config::LoggingConfig;

/// Target of the structured audit trail
pub const AUDIT_TARGET: &str = "devlake_mcp::audit";

/// Initialize logging and, with the `metrics` feature, the Prometheus recorder
pub fn init_observability(config: &LoggingConfig) -> Result<()> {
    #[cfg(feature = "metrics")]
    {
        init_metrics()?;
    }

    init_logging(config);
    Ok(())
}

/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
