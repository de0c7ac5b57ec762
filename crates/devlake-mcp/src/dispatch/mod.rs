//! Dispatcher: routes tool invocations through validation, execution and masking

mod registry;
pub mod tools;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

pub use registry::{Tool, ToolDescriptor, ToolRegistry, parse_arguments};

use crate::config::Config;
use crate::db::{ConnectionManager, Connector, HealthReport};
use crate::security::{MaskedResult, Masker, QueryValidator};
use crate::session::{ChannelId, RateLimiter, SessionTracker, StatsSnapshot};
use crate::types::ToolResponse;
use crate::{Error, Result};

/// Components a tool may use. Free SQL only reaches the database through
/// [`Pipeline::run_query`].
pub struct Pipeline {
    validator: QueryValidator,
    masker: Masker,
    connections: ConnectionManager,
    sessions: SessionTracker,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("validator", &self.validator)
            .field("connections", &self.connections)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub const fn new(
        validator: QueryValidator,
        masker: Masker,
        connections: ConnectionManager,
        sessions: SessionTracker,
    ) -> Self {
        Self {
            validator,
            masker,
            connections,
            sessions,
        }
    }

    #[must_use]
    pub const fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    #[must_use]
    pub const fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Validate, execute and mask one query.
    ///
    /// A rejected query never touches the pool. The lease is released on
    /// every exit path; if this future is dropped mid-flight the lease drop
    /// discards the connection.
    pub async fn run_query(&self, raw: &str, limit: Option<u32>) -> Result<MaskedResult> {
        let query = self.validator.check(raw)?;

        let mut lease = self.connections.acquire(None).await?;
        let result = self.connections.execute(&mut lease, &query, limit).await;
        self.connections.release(lease);

        Ok(self.masker.mask_result(result?))
    }
}

struct Inner {
    pipeline: Pipeline,
    registry: ToolRegistry,
}

/// Entry point for tool invocations. Cloning shares the same state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pipeline", &self.inner.pipeline)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl Dispatcher {
    /// Wire every component from `config` on top of `connector`.
    ///
    /// Spawns the session sweeper, so it must run inside a tokio runtime.
    pub fn from_config(config: &Config, connector: Arc<dyn Connector>) -> Result<Self> {
        let validator = QueryValidator::new(config.validator_config());
        let connections = ConnectionManager::new(connector, config.pool_settings())?;
        let sessions = SessionTracker::spawn(
            config.tracker_settings(),
            RateLimiter::per_minute(config.sessions.rate_limit_per_minute),
        );
        Self::new(Pipeline::new(validator, Masker::new()?, connections, sessions))
    }

    /// Dispatcher with the built-in tools
    pub fn new(pipeline: Pipeline) -> Result<Self> {
        Ok(Self::with_registry(pipeline, tools::builtin_registry()?))
    }

    #[must_use]
    pub fn with_registry(pipeline: Pipeline, registry: ToolRegistry) -> Self {
        Self {
            inner: Arc::new(Inner { pipeline, registry }),
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.inner.registry.descriptors()
    }

    /// Record first contact from `channel` so its session exists before any call.
    pub fn open_channel(&self, channel: &ChannelId) {
        self.inner.pipeline.sessions.touch(channel);
    }

    /// Run `tool` for `channel`. Failures come back as a structured error body.
    pub async fn dispatch(
        &self,
        channel: &ChannelId,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> ToolResponse {
        let start = Instant::now();
        let outcome = self.invoke(channel, tool, arguments).await;

        #[cfg(feature = "metrics")]
        crate::observability::record_tool_call(
            tool,
            start.elapsed(),
            outcome.as_ref().map_err(Error::category).map(MaskedResult::row_count),
        );

        match outcome {
            Ok(result) => {
                tracing::debug!(
                    tool,
                    channel = %channel,
                    rows = result.row_count(),
                    elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Tool call completed"
                );
                ToolResponse::from_result(result)
            }
            Err(e) => {
                if e.is_rejected() || matches!(e, Error::RateLimited) {
                    tracing::debug!(tool, channel = %channel, category = e.category(), "Tool call refused");
                } else {
                    tracing::warn!(tool, channel = %channel, error = %e, "Tool call failed");
                }
                ToolResponse::failure(&e)
            }
        }
    }

    async fn invoke(
        &self,
        channel: &ChannelId,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<MaskedResult> {
        let (descriptor, handler) = self
            .inner
            .registry
            .get(tool)
            .ok_or_else(|| Error::UnknownTool(tool.to_string()))?;

        let sessions = &self.inner.pipeline.sessions;
        if descriptor.queries_database {
            sessions.stats().record_query();
        }
        sessions.admit(channel)?;

        let result = handler.invoke(&self.inner.pipeline, arguments).await;
        if let Err(Error::Rejected(rejection)) = &result {
            sessions.stats().record_rejection(rejection.category);
            #[cfg(feature = "metrics")]
            crate::observability::record_rejection(rejection.category.as_str());
        }
        result
    }

    /// Stats snapshot; never waits on query execution
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.pipeline.sessions.snapshot()
    }

    pub async fn health(&self) -> HealthReport {
        self.inner.pipeline.connections.health_report().await
    }

    /// Stop the session sweeper and close the pool.
    pub async fn shutdown(&self) {
        self.inner.pipeline.sessions.shutdown().await;
        self.inner.pipeline.connections.close();
        tracing::info!("Dispatcher shut down");
    }
}
