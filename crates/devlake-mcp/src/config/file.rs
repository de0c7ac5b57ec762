//! TOML configuration file loading

use std::net::IpAddr;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::builder::{ConfigBuilder, TransportMode};
use crate::Result;
use crate::security::DatabaseFilter;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./devlake-mcp.toml",
    "~/.config/devlake-mcp/config.toml",
    "/etc/devlake-mcp/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_PATHS.iter().find_map(|path_str| {
        let path = match path_str.strip_prefix('~') {
            Some(rest) => PathBuf::from(format!("{}{rest}", std::env::var("HOME").ok()?)),
            None => PathBuf::from(path_str),
        };
        path.exists().then_some(path)
    })
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(db) = config.database {
        if let Some(url_str) = db.url {
            let url = Url::parse(&url_str)
                .map_err(|e| crate::Error::Config(format!("Invalid connection URL: {e}")))?;
            builder = builder.connection_url(url);
        }

        if let Some(size) = db.pool_size
            && let Some(nz) = NonZeroUsize::new(size)
        {
            builder = builder.pool_size(nz);
        }

        if let Some(secs) = db.acquire_timeout_secs {
            builder = builder.acquire_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = db.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = db.query_timeout_secs {
            builder = builder.query_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = db.max_connection_lifetime_secs {
            builder = builder.max_connection_lifetime(Duration::from_secs(secs));
        }
        if let Some(attempts) = db.reconnect_attempts {
            builder = builder.reconnect_attempts(attempts);
        }
        if let Some(ms) = db.reconnect_backoff_ms {
            builder = builder.reconnect_backoff(Duration::from_millis(ms));
        }
    }

    if let Some(limits) = config.limits {
        if let Some(limit) = limits.default_row_limit.and_then(NonZeroU32::new) {
            builder = builder.default_row_limit(limit);
        }
        if let Some(limit) = limits.max_row_limit.and_then(NonZeroU32::new) {
            builder = builder.max_row_limit(limit);
        }
    }

    if let Some(validator) = config.validator {
        if let Some(length) = validator.max_query_length.and_then(NonZeroUsize::new) {
            builder = builder.max_query_length(length);
        }

        if let Some(keywords) = validator.forbidden_keywords {
            builder = builder.extra_forbidden_keywords(keywords);
        }

        if let Some(filter_config) = validator.database_filter {
            let databases = filter_config.databases.unwrap_or_default();
            let mode = filter_config.mode.as_deref().unwrap_or("blacklist");
            let filter = DatabaseFilter::from_config(mode, &databases)?;
            builder = builder.database_filter(filter);
        }
    }

    if let Some(sessions) = config.sessions {
        if let Some(secs) = sessions.ttl_secs {
            builder = builder.session_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = sessions.sweep_interval_secs
            && secs > 0
        {
            builder = builder.sweep_interval(Duration::from_secs(secs));
        }
        if let Some(limit) = sessions.rate_limit_per_minute.and_then(NonZeroU32::new) {
            builder = builder.rate_limit_per_minute(limit);
        }
    }

    if let Some(transport) = config.transport {
        if let Some(mode_str) = transport.mode {
            let mode: TransportMode = mode_str.parse().unwrap_or_default();
            builder = builder.transport_mode(mode);
        }

        if let Some(host_str) = transport.http_host
            && let Ok(host) = host_str.parse::<IpAddr>()
        {
            builder = builder.http_host(host);
        }

        if let Some(port) = transport.http_port {
            builder = builder.http_port(port);
        }
    }

    if let Some(logging) = config.logging {
        if let Some(level) = logging.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = logging.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    database: Option<DatabaseSection>,
    limits: Option<LimitsSection>,
    validator: Option<ValidatorSection>,
    sessions: Option<SessionsSection>,
    transport: Option<TransportSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Deserialize)]
struct DatabaseSection {
    url: Option<String>,
    pool_size: Option<usize>,
    acquire_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    query_timeout_secs: Option<u64>,
    max_connection_lifetime_secs: Option<u64>,
    reconnect_attempts: Option<u32>,
    reconnect_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LimitsSection {
    default_row_limit: Option<u32>,
    max_row_limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ValidatorSection {
    max_query_length: Option<usize>,
    forbidden_keywords: Option<Vec<String>>,
    database_filter: Option<DatabaseFilterSection>,
}

#[derive(Debug, Deserialize)]
struct DatabaseFilterSection {
    mode: Option<String>,
    databases: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SessionsSection {
    ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    rate_limit_per_minute: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TransportSection {
    mode: Option<String>,
    http_host: Option<String>,
    http_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct LoggingSection {
    log_level: Option<String>,
    json_logs: Option<bool>,
}
