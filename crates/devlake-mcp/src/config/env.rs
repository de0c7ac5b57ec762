//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;
use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use url::Url;

use super::builder::{ConfigBuilder, TransportMode};
use crate::Result;
use crate::security::DatabaseFilter;

/// Environment variable names
mod vars {
    pub const DB_URL: &str = "DB_URL";
    pub const DB_HOST: &str = "DB_HOST";
    pub const DB_PORT: &str = "DB_PORT";
    pub const DB_USER: &str = "DB_USER";
    pub const DB_PASSWORD: &str = "DB_PASSWORD";
    pub const DB_DATABASE: &str = "DB_DATABASE";
    pub const DB_POOL_MAX_SIZE: &str = "DB_POOL_MAX_SIZE";
    pub const DB_CONNECT_TIMEOUT: &str = "DB_CONNECT_TIMEOUT";
    pub const DB_READ_TIMEOUT: &str = "DB_READ_TIMEOUT";
    pub const DB_POOL_RECYCLE: &str = "DB_POOL_RECYCLE";
    pub const TRANSPORT: &str = "TRANSPORT";
    pub const SERVER_HOST: &str = "SERVER_HOST";
    pub const SERVER_PORT: &str = "SERVER_PORT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const MCP_JSON_LOGS: &str = "MCP_JSON_LOGS";
    pub const MCP_DEFAULT_ROW_LIMIT: &str = "MCP_DEFAULT_ROW_LIMIT";
    pub const MCP_MAX_ROW_LIMIT: &str = "MCP_MAX_ROW_LIMIT";
    pub const MCP_MAX_QUERY_LENGTH: &str = "MCP_MAX_QUERY_LENGTH";
    pub const MCP_FORBIDDEN_KEYWORDS: &str = "MCP_FORBIDDEN_KEYWORDS";
    pub const MCP_DATABASE_FILTER_MODE: &str = "MCP_DATABASE_FILTER_MODE";
    pub const MCP_DATABASE_FILTER_NAMES: &str = "MCP_DATABASE_FILTER_NAMES";
    pub const MCP_SESSION_TTL_SECS: &str = "MCP_SESSION_TTL_SECS";
    pub const MCP_RATE_LIMIT_PER_MINUTE: &str = "MCP_RATE_LIMIT_PER_MINUTE";
}

const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    // Connection URL, either whole or from its parts
    if let Ok(url_str) = env::var(vars::DB_URL) {
        let mut url = Url::parse(&url_str)
            .map_err(|e| crate::Error::Config(format!("Invalid {}: {}", vars::DB_URL, e)))?;
        apply_credentials(&mut url)?;
        builder = builder.connection_url(url);
    } else if let Ok(host) = env::var(vars::DB_HOST) {
        builder = builder.connection_url(url_from_parts(&host)?);
    }

    // Pool and timeouts
    if let Ok(size_str) = env::var(vars::DB_POOL_MAX_SIZE)
        && let Ok(size) = size_str.parse::<usize>()
        && let Some(nz) = NonZeroUsize::new(size)
    {
        builder = builder.pool_size(nz);
    }

    if let Some(timeout) = secs_var(vars::DB_CONNECT_TIMEOUT) {
        builder = builder.connect_timeout(timeout);
    }

    if let Some(timeout) = secs_var(vars::DB_READ_TIMEOUT) {
        builder = builder.query_timeout(timeout);
    }

    if let Some(lifetime) = secs_var(vars::DB_POOL_RECYCLE) {
        builder = builder.max_connection_lifetime(lifetime);
    }

    // Row limits
    if let Ok(limit_str) = env::var(vars::MCP_DEFAULT_ROW_LIMIT)
        && let Ok(limit) = limit_str.parse::<u32>()
        && let Some(nz) = NonZeroU32::new(limit)
    {
        builder = builder.default_row_limit(nz);
    }

    if let Ok(limit_str) = env::var(vars::MCP_MAX_ROW_LIMIT)
        && let Ok(limit) = limit_str.parse::<u32>()
        && let Some(nz) = NonZeroU32::new(limit)
    {
        builder = builder.max_row_limit(nz);
    }

    // Validator
    if let Ok(length_str) = env::var(vars::MCP_MAX_QUERY_LENGTH)
        && let Ok(length) = length_str.parse::<usize>()
        && let Some(nz) = NonZeroUsize::new(length)
    {
        builder = builder.max_query_length(nz);
    }

    if let Ok(keywords) = env::var(vars::MCP_FORBIDDEN_KEYWORDS) {
        builder = builder.extra_forbidden_keywords(split_list(&keywords));
    }

    if let Ok(mode) = env::var(vars::MCP_DATABASE_FILTER_MODE) {
        let names = env::var(vars::MCP_DATABASE_FILTER_NAMES)
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let filter = DatabaseFilter::from_config(&mode, &names)?;
        builder = builder.database_filter(filter);
    }

    // Sessions
    if let Some(ttl) = secs_var(vars::MCP_SESSION_TTL_SECS) {
        builder = builder.session_ttl(ttl);
    }

    if let Ok(limit_str) = env::var(vars::MCP_RATE_LIMIT_PER_MINUTE)
        && let Ok(limit) = limit_str.parse::<u32>()
        && let Some(nz) = NonZeroU32::new(limit)
    {
        builder = builder.rate_limit_per_minute(nz);
    }

    // Transport
    if let Ok(transport) = env::var(vars::TRANSPORT) {
        let mode: TransportMode = transport.parse().unwrap_or_default();
        builder = builder.transport_mode(mode);
    }

    if let Ok(host_str) = env::var(vars::SERVER_HOST)
        && let Ok(host) = host_str.parse::<IpAddr>()
    {
        builder = builder.http_host(host);
    }

    if let Ok(port_str) = env::var(vars::SERVER_PORT)
        && let Ok(port) = port_str.parse::<u16>()
    {
        builder = builder.http_port(port);
    }

    // Logging; RUST_LOG wins over LOG_LEVEL
    if let Ok(level) = env::var(vars::LOG_LEVEL) {
        builder = builder.log_level(level.to_lowercase());
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::MCP_JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn url_from_parts(host: &str) -> Result<Url> {
    let port = env::var(vars::DB_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_MYSQL_PORT);
    let database = env::var(vars::DB_DATABASE).unwrap_or_default();

    let mut url = Url::parse(&format!("mysql://{host}:{port}/{database}"))
        .map_err(|e| crate::Error::Config(format!("Invalid {}: {}", vars::DB_HOST, e)))?;
    apply_credentials(&mut url)?;
    Ok(url)
}

fn apply_credentials(url: &mut Url) -> Result<()> {
    if let Ok(user) = env::var(vars::DB_USER) {
        url.set_username(&user)
            .map_err(|()| crate::Error::Config("Failed to set username in URL".into()))?;
    }
    if let Ok(password) = env::var(vars::DB_PASSWORD) {
        url.set_password(Some(&password))
            .map_err(|()| crate::Error::Config("Failed to set password in URL".into()))?;
    }
    Ok(())
}

fn secs_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
