//! MCP server for DevLake MySQL databases
//!
//! Every tool call runs through one pipeline: the [`Dispatcher`] admits the
//! caller through the session tracker, the query validator decides whether
//! SQL may run, the connection manager executes it under a deadline and a row
//! cap, and the masker redacts sensitive values before anything is returned.

pub mod config;
mod constants;
pub mod db;
pub mod dispatch;
mod error;
pub mod observability;
pub mod security;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

pub use config::{Config, ConfigBuilder, TransportConfig, TransportMode};
pub use db::{ConnectionManager, Connector, MySqlConnector};
pub use dispatch::{Dispatcher, Pipeline};
pub use error::{Error, Rejection, RejectionCategory, Result};
pub use security::{Masker, QueryValidator};
pub use server::ServerHandler;
pub use session::{ChannelId, SessionTracker};
pub use types::*;
