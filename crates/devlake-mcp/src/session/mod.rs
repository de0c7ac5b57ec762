//! Session tracking, security statistics and per-channel rate limiting

mod rate_limit;
mod stats;
mod tracker;

use std::fmt;
use std::sync::Arc;

pub use rate_limit::RateLimiter;
pub use stats::{SecurityStats, StatsSnapshot};
pub use tracker::{Session, SessionState, SessionTracker, TrackerSettings};

/// Identity of one caller connection: the stdio pipe, or one HTTP MCP session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The single channel served over stdio
    #[must_use]
    pub fn stdio() -> Self {
        Self::new("stdio")
    }

    /// A fresh channel with a random identity
    #[must_use]
    pub fn random() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
