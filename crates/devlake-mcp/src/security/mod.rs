//! Query safety: validation, identifier rules, masking and deadlines

mod identifier;
mod masking;
mod query_guard;
pub mod tokenizer;
mod validator;

pub use identifier::{DatabaseFilter, IdentifierKind, RESERVED_DATABASES, check_identifier};
pub use masking::{MaskedResult, Masker, MaskingRule, REDACTED, Replacement};
pub use query_guard::{ExecuteError, QueryGuard};
pub use validator::{
    FORBIDDEN_KEYWORDS, QueryValidator, ValidatedQuery, ValidationResult, ValidatorConfig,
    fingerprint,
};
