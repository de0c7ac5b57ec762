//! Backend abstraction used by the connection pool

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use super::SqlValue;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Network or protocol failure; the connection is suspect and the call
    /// may succeed on a fresh connection
    Transient,
    /// The server rejected the statement
    Query,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DbError {
    pub kind: DbErrorKind,
    pub message: String,
}

impl DbError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Query,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind, DbErrorKind::Transient)
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        match err.kind {
            DbErrorKind::Transient => Self::Connection(err.message),
            DbErrorKind::Query => Self::Query(err.message),
        }
    }
}

/// Rows returned by one fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    /// The server produced more rows than were requested
    pub has_more: bool,
}

/// One live database session
#[async_trait]
pub trait DbConnection: Send {
    /// Run a single read-only statement, keeping at most `max_rows` rows.
    async fn fetch(&mut self, sql: &str, max_rows: usize) -> Result<FetchedRows, DbError>;

    async fn ping(&mut self) -> Result<(), DbError>;
}

/// Opens new database sessions for the pool
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug + 'static {
    async fn connect(&self) -> Result<Box<dyn DbConnection>, DbError>;

    /// Host, port and database for logging; never includes credentials
    fn endpoint(&self) -> String;
}
