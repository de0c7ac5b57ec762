//! Deadline enforcement for database round trips

use std::future::Future;
use std::time::Duration;

use crate::Error;

/// Wraps database futures with the configured query timeout
#[derive(Debug, Clone, Copy)]
pub struct QueryGuard {
    timeout: Duration,
}

impl QueryGuard {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `query_fn`, dropping it if the deadline passes first.
    ///
    /// Dropping the future aborts the in-flight call; the caller must treat the
    /// connection it was using as suspect.
    pub async fn execute<F, T, E>(&self, query_fn: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<Error>,
    {
        tokio::time::timeout(self.timeout, query_fn)
            .await
            .map_err(|_| Error::QueryTimeout(self.timeout))?
            .map_err(Into::into)
    }

    /// Like [`Self::execute`], but keeps the backend error type so callers
    /// can tell transient failures from query errors.
    pub async fn execute_with_error<F, T, E>(&self, query_fn: F) -> Result<T, ExecuteError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        tokio::time::timeout(self.timeout, query_fn)
            .await
            .map_err(|_| ExecuteError::Timeout(self.timeout))?
            .map_err(ExecuteError::Query)
    }
}

/// Error type for [`QueryGuard::execute_with_error`]
#[derive(Debug)]
pub enum ExecuteError<E> {
    Timeout(Duration),
    Query(E),
}

impl<E> ExecuteError<E> {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl<E: std::fmt::Display> std::fmt::Display for ExecuteError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(d) => write!(f, "query timeout after {d:?}"),
            Self::Query(e) => write!(f, "{e}"),
        }
    }
}
