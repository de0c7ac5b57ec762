//! Prometheus metrics for devlake-mcp

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

// Server metrics
const METRIC_UPTIME: &str = "devlake_mcp_uptime_seconds";
const METRIC_INFO: &str = "devlake_mcp_info";

// Tool metrics
const METRIC_TOOL_CALLS: &str = "devlake_mcp_tool_calls_total";
const METRIC_TOOL_DURATION: &str = "devlake_mcp_tool_duration_seconds";
const METRIC_ROWS: &str = "devlake_mcp_rows_returned_total";
const METRIC_REJECTIONS: &str = "devlake_mcp_rejections_total";

// Connection pool metrics
const METRIC_POOL_SIZE: &str = "devlake_mcp_pool_connections";
const METRIC_POOL_WAIT_TIME: &str = "devlake_mcp_pool_wait_seconds";
const METRIC_POOL_ERRORS: &str = "devlake_mcp_pool_errors_total";
const METRIC_RECONNECTS: &str = "devlake_mcp_reconnects_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Server uptime in seconds");
    describe_gauge!(METRIC_INFO, "Server information (always 1)");

    describe_counter!(METRIC_TOOL_CALLS, "Tool invocations by tool and outcome");
    describe_histogram!(METRIC_TOOL_DURATION, "Tool invocation duration in seconds");
    describe_counter!(METRIC_ROWS, "Rows returned to callers");
    describe_counter!(METRIC_REJECTIONS, "Queries rejected by category");

    describe_gauge!(METRIC_POOL_SIZE, "Connection pool size by state");
    describe_histogram!(
        METRIC_POOL_WAIT_TIME,
        "Time waiting for a connection from pool"
    );
    describe_counter!(METRIC_POOL_ERRORS, "Total pool connection errors");
    describe_counter!(METRIC_RECONNECTS, "Reconnect attempts after transient failures");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record one tool invocation: row count on success, error category on failure.
pub fn record_tool_call(tool: &str, duration: Duration, outcome: std::result::Result<usize, &str>) {
    histogram!(METRIC_TOOL_DURATION, "tool" => tool.to_owned()).record(duration.as_secs_f64());

    match outcome {
        Ok(rows) => {
            counter!(
                METRIC_TOOL_CALLS,
                "tool" => tool.to_owned(),
                "status" => "success".to_owned(),
            )
            .increment(1);
            counter!(METRIC_ROWS, "tool" => tool.to_owned()).increment(rows as u64);
        }
        Err(category) => {
            counter!(
                METRIC_TOOL_CALLS,
                "tool" => tool.to_owned(),
                "status" => category.to_owned(),
            )
            .increment(1);
        }
    }
}

/// Record a validator rejection.
pub fn record_rejection(category: &str) {
    counter!(METRIC_REJECTIONS, "category" => category.to_owned()).increment(1);
}

/// Record a reconnect attempt.
pub fn record_reconnect() {
    counter!(METRIC_RECONNECTS).increment(1);
}

/// Update pool size gauges.
#[allow(clippy::cast_precision_loss)]
pub fn set_pool_stats(max: usize, available: usize, waiting: usize) {
    gauge!(METRIC_POOL_SIZE, "state" => "max".to_owned()).set(max as f64);
    gauge!(METRIC_POOL_SIZE, "state" => "available".to_owned()).set(available as f64);
    gauge!(METRIC_POOL_SIZE, "state" => "in_use".to_owned())
        .set(max.saturating_sub(available) as f64);
    gauge!(METRIC_POOL_SIZE, "state" => "waiting".to_owned()).set(waiting as f64);
}

/// Record time spent waiting for a connection.
pub fn record_pool_wait_time(duration: Duration) {
    histogram!(METRIC_POOL_WAIT_TIME).record(duration.as_secs_f64());
}

/// Record a pool connection error.
pub fn record_pool_error(error_type: &str) {
    counter!(METRIC_POOL_ERRORS, "type" => error_type.to_owned()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics_without_init() {
        let output = render_metrics();
        assert!(output.is_empty());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_tool_call("execute_query", Duration::from_millis(3), Ok(10));
        record_tool_call("execute_query", Duration::from_millis(1), Err("ForbiddenKeyword"));
        record_rejection("ForbiddenKeyword");
        record_reconnect();
        set_pool_stats(10, 4, 0);
        record_pool_wait_time(Duration::from_millis(5));
        record_pool_error("exhausted");
    }
}
