use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Reason a query or identifier argument was refused by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectionCategory {
    StatementTypeViolation,
    ForbiddenKeyword,
    StructuralAnomaly,
    IdentifierViolation,
    LengthExceeded,
}

impl RejectionCategory {
    pub const ALL: [Self; 5] = [
        Self::StatementTypeViolation,
        Self::ForbiddenKeyword,
        Self::StructuralAnomaly,
        Self::IdentifierViolation,
        Self::LengthExceeded,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatementTypeViolation => "StatementTypeViolation",
            Self::ForbiddenKeyword => "ForbiddenKeyword",
            Self::StructuralAnomaly => "StructuralAnomaly",
            Self::IdentifierViolation => "IdentifierViolation",
            Self::LengthExceeded => "LengthExceeded",
        }
    }
}

impl fmt::Display for RejectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validator verdict that refused the input.
///
/// `injection` marks inputs that matched a known injection idiom; their text is
/// never echoed back to callers or written to the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub category: RejectionCategory,
    pub detail: String,
    pub injection: bool,
}

impl Rejection {
    pub fn new(category: RejectionCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            detail: detail.into(),
            injection: false,
        }
    }

    pub fn injection(category: RejectionCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            detail: detail.into(),
            injection: true,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.detail)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Query rejected ({0})")]
    Rejected(Rejection),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Query timeout after {0:?}")]
    QueryTimeout(Duration),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    #[must_use]
    pub const fn is_pool_exhausted(&self) -> bool {
        matches!(self, Self::PoolExhausted)
    }

    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::QueryTimeout(_))
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Errors a caller may reasonably retry without changing the request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted | Self::QueryTimeout(_) | Self::RateLimited
        )
    }

    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Category name reported to callers in the structured error body.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Rejected(rejection) => rejection.category.as_str(),
            Self::PoolExhausted => "PoolExhausted",
            Self::Connection(_) => "ConnectionError",
            Self::Query(_) => "QueryError",
            Self::QueryTimeout(_) => "Timeout",
            Self::RateLimited => "RateLimited",
            Self::InvalidArguments(_) => "InvalidArguments",
            Self::UnknownTool(_) => "UnknownTool",
            Self::Config(_) => "ConfigError",
            Self::Transport(_) => "TransportError",
        }
    }

    /// Message that is safe to hand back to the caller.
    #[must_use]
    pub fn caller_message(&self) -> String {
        match self {
            Self::Rejected(rejection) if rejection.injection => {
                "Query matched a known injection pattern".to_string()
            }
            Self::Rejected(rejection) => rejection.detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
