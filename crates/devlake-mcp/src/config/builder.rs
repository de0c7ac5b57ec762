//! Configuration builder

use std::net::{IpAddr, Ipv4Addr};
use std::num::{NonZeroU32, NonZeroUsize};
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::Error;
use crate::db::{PoolSettings, ReconnectPolicy};
use crate::security::{DatabaseFilter, ValidatorConfig};
use crate::session::TrackerSettings;

const MYSQL_SCHEME: &str = "mysql";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub connection_url: Url,
    pub pool_size: NonZeroUsize,
    pub acquire_timeout: Duration,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub max_connection_lifetime: Duration,
    pub default_row_limit: NonZeroU32,
    pub max_row_limit: NonZeroU32,
    pub reconnect: ReconnectPolicy,
    pub validator: ValidatorConfig,
    pub sessions: SessionConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    #[must_use]
    pub const fn database_filter(&self) -> &DatabaseFilter {
        &self.validator.database_filter
    }

    #[must_use]
    pub const fn validator_config(&self) -> &ValidatorConfig {
        &self.validator
    }

    #[must_use]
    pub const fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.pool_size.get(),
            acquire_timeout: self.acquire_timeout,
            connect_timeout: self.connect_timeout,
            query_timeout: self.query_timeout,
            max_lifetime: self.max_connection_lifetime,
            default_row_limit: self.default_row_limit.get(),
            max_row_limit: self.max_row_limit.get(),
            reconnect: self.reconnect,
        }
    }

    #[must_use]
    pub const fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            ttl: self.sessions.ttl,
            sweep_interval: self.sessions.sweep_interval,
        }
    }

    /// Connection URL without the password, for logs
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let mut url = self.connection_url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        url.to_string()
    }
}

/// Session lifetime and per-channel rate limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub rate_limit_per_minute: NonZeroU32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
            rate_limit_per_minute: ConfigBuilder::DEFAULT_RATE_LIMIT,
        }
    }
}

/// Transport mode configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub http_host: IpAddr,
    pub http_port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Stdio,
            http_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: 8000,
        }
    }
}

/// Transport mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

impl FromStr for TransportMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "http" | "sse" | "streamable-http" => Self::Http,
            _ => Self::Stdio,
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    connection_url: Option<Url>,
    pool_size: NonZeroUsize,
    acquire_timeout: Duration,
    connect_timeout: Duration,
    query_timeout: Duration,
    max_connection_lifetime: Duration,
    default_row_limit: NonZeroU32,
    max_row_limit: NonZeroU32,
    reconnect: ReconnectPolicy,
    max_query_length: NonZeroUsize,
    extra_forbidden_keywords: Vec<String>,
    database_filter: Option<DatabaseFilter>,
    sessions: SessionConfig,
    transport: TransportConfig,
    logging: LoggingConfig,
}

impl ConfigBuilder {
    const DEFAULT_POOL_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(9); // 10
    const DEFAULT_ROW_LIMIT: NonZeroU32 = NonZeroU32::MIN.saturating_add(99); // 100
    const MAX_ROW_LIMIT: NonZeroU32 = NonZeroU32::MIN.saturating_add(999); // 1000
    const DEFAULT_RATE_LIMIT: NonZeroU32 = NonZeroU32::MIN.saturating_add(99); // 100
    const MAX_QUERY_LENGTH: NonZeroUsize = NonZeroUsize::MIN.saturating_add(9_999); // 10000

    #[must_use]
    pub const fn new() -> Self {
        Self {
            connection_url: None,
            pool_size: Self::DEFAULT_POOL_SIZE,
            acquire_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(60),
            max_connection_lifetime: Duration::from_secs(300),
            default_row_limit: Self::DEFAULT_ROW_LIMIT,
            max_row_limit: Self::MAX_ROW_LIMIT,
            reconnect: ReconnectPolicy {
                attempts: 3,
                initial_backoff: Duration::from_millis(200),
                max_backoff: Duration::from_secs(5),
            },
            max_query_length: Self::MAX_QUERY_LENGTH,
            extra_forbidden_keywords: Vec::new(),
            database_filter: None,
            sessions: SessionConfig {
                ttl: Duration::from_secs(24 * 60 * 60),
                sweep_interval: Duration::from_secs(60),
                rate_limit_per_minute: Self::DEFAULT_RATE_LIMIT,
            },
            transport: TransportConfig {
                mode: TransportMode::Stdio,
                http_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                http_port: 8000,
            },
            logging: LoggingConfig {
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    #[must_use]
    pub fn connection_url(mut self, url: Url) -> Self {
        self.connection_url = Some(url);
        self
    }

    #[must_use]
    pub const fn has_connection_url(&self) -> bool {
        self.connection_url.is_some()
    }

    #[must_use]
    pub const fn pool_size(mut self, size: NonZeroUsize) -> Self {
        self.pool_size = size;
        self
    }

    #[must_use]
    pub const fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Connections older than this are replaced on their next checkout
    #[must_use]
    pub const fn max_connection_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_connection_lifetime = lifetime;
        self
    }

    #[must_use]
    pub const fn default_row_limit(mut self, limit: NonZeroU32) -> Self {
        self.default_row_limit = limit;
        self
    }

    #[must_use]
    pub const fn max_row_limit(mut self, limit: NonZeroU32) -> Self {
        self.max_row_limit = limit;
        self
    }

    #[must_use]
    pub const fn reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect.attempts = attempts;
        self
    }

    /// Initial reconnect delay; doubles per attempt up to the policy maximum
    #[must_use]
    pub const fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect.initial_backoff = backoff;
        self
    }

    #[must_use]
    pub const fn max_query_length(mut self, length: NonZeroUsize) -> Self {
        self.max_query_length = length;
        self
    }

    #[must_use]
    pub fn extra_forbidden_keywords(mut self, keywords: Vec<String>) -> Self {
        self.extra_forbidden_keywords = keywords;
        self
    }

    #[must_use]
    pub fn database_filter(mut self, filter: DatabaseFilter) -> Self {
        self.database_filter = Some(filter);
        self
    }

    #[must_use]
    pub const fn session_ttl(mut self, ttl: Duration) -> Self {
        self.sessions.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sessions.sweep_interval = interval;
        self
    }

    #[must_use]
    pub const fn rate_limit_per_minute(mut self, limit: NonZeroU32) -> Self {
        self.sessions.rate_limit_per_minute = limit;
        self
    }

    #[must_use]
    pub const fn transport_mode(mut self, mode: TransportMode) -> Self {
        self.transport.mode = mode;
        self
    }

    #[must_use]
    pub const fn http_host(mut self, host: IpAddr) -> Self {
        self.transport.http_host = host;
        self
    }

    #[must_use]
    pub const fn http_port(mut self, port: u16) -> Self {
        self.transport.http_port = port;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.logging.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.logging.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        let connection_url = self
            .connection_url
            .ok_or_else(|| Error::Config("connection_url is required".into()))?;

        if connection_url.scheme() != MYSQL_SCHEME {
            return Err(Error::Config(format!(
                "Unsupported connection URL scheme '{}', expected '{MYSQL_SCHEME}'",
                connection_url.scheme()
            )));
        }

        if self.default_row_limit > self.max_row_limit {
            return Err(Error::Config(format!(
                "default row limit {} exceeds maximum row limit {}",
                self.default_row_limit, self.max_row_limit
            )));
        }

        let log_level = if self.logging.log_level.is_empty() {
            "info".to_string()
        } else {
            self.logging.log_level
        };

        Ok(Config {
            connection_url,
            pool_size: self.pool_size,
            acquire_timeout: self.acquire_timeout,
            connect_timeout: self.connect_timeout,
            query_timeout: self.query_timeout,
            max_connection_lifetime: self.max_connection_lifetime,
            default_row_limit: self.default_row_limit,
            max_row_limit: self.max_row_limit,
            reconnect: self.reconnect,
            validator: ValidatorConfig {
                max_query_length: self.max_query_length,
                extra_forbidden_keywords: self.extra_forbidden_keywords,
                database_filter: self.database_filter.unwrap_or_default(),
            },
            sessions: self.sessions,
            transport: self.transport,
            logging: LoggingConfig {
                log_level,
                json_logs: self.logging.json_logs,
            },
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
