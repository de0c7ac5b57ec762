//! Validation of identifiers passed as separate tool arguments

use std::collections::HashSet;
use std::fmt;

use crate::error::{Rejection, RejectionCategory};
use crate::{Error, Result};

/// Maximum identifier length accepted by MySQL
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Databases that are never browsable through the identifier arguments
pub const RESERVED_DATABASES: &[&str] = &[
    "information_schema",
    "mysql",
    "performance_schema",
    "sys",
    "test",
    "tmp",
    "temp",
];

/// SQL words that may not be used as a bare identifier argument
const RESERVED_WORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "COLUMN", "DATABASE", "DESC", "DISTINCT",
    "ELSE", "END", "EXISTS", "FALSE", "FROM", "GROUP", "HAVING", "IN", "INDEX", "IS", "JOIN",
    "KEY", "LIKE", "LIMIT", "NOT", "NULL", "ON", "OR", "ORDER", "PRIMARY", "SCHEMA", "SELECT",
    "TABLE", "THEN", "TRUE", "UNION", "VALUES", "WHEN", "WHERE", "WITH",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Database,
    Table,
    Column,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Database => "database name",
            Self::Table => "table name",
            Self::Column => "column name",
        })
    }
}

/// Check the shape of an identifier argument.
///
/// `blocked_words` holds upper-cased keywords that are also refused, on top of
/// the built-in reserved words.
pub fn check_identifier(
    name: &str,
    kind: IdentifierKind,
    blocked_words: &HashSet<String>,
) -> std::result::Result<(), Rejection> {
    if name.is_empty() {
        return Err(Rejection::new(
            RejectionCategory::IdentifierViolation,
            format!("{kind} cannot be empty"),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Rejection::new(
            RejectionCategory::IdentifierViolation,
            format!("{kind} contains invalid characters; only A-Z, a-z, 0-9 and _ are allowed"),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(Rejection::new(
            RejectionCategory::IdentifierViolation,
            format!("{kind} exceeds {MAX_IDENTIFIER_LENGTH} characters"),
        ));
    }

    let upper = name.to_ascii_uppercase();
    if RESERVED_WORDS.contains(&upper.as_str()) || blocked_words.contains(&upper) {
        return Err(Rejection::new(
            RejectionCategory::IdentifierViolation,
            format!("{kind} '{name}' is a reserved keyword"),
        ));
    }

    Ok(())
}

/// Database access filter applied to database arguments
#[derive(Debug, Clone)]
pub enum DatabaseFilter {
    AllowAll,
    /// Only the listed databases may be browsed
    Whitelist(HashSet<String>),
    /// The listed databases may not be browsed
    Blacklist(HashSet<String>),
}

impl Default for DatabaseFilter {
    fn default() -> Self {
        Self::Blacklist(
            RESERVED_DATABASES
                .iter()
                .map(|db| (*db).to_string())
                .collect(),
        )
    }
}

impl DatabaseFilter {
    pub fn is_allowed(&self, database: &str) -> bool {
        let database = database.to_lowercase();
        match self {
            Self::AllowAll => true,
            Self::Whitelist(allowed) => allowed.contains(&database),
            Self::Blacklist(denied) => !denied.contains(&database),
        }
    }

    pub fn check(&self, database: &str) -> std::result::Result<(), Rejection> {
        if self.is_allowed(database) {
            Ok(())
        } else {
            Err(Rejection::new(
                RejectionCategory::IdentifierViolation,
                format!("database '{database}' is reserved or not accessible"),
            ))
        }
    }

    /// Build a filter from configuration strings.
    ///
    /// The blacklist mode always keeps the reserved system databases.
    pub fn from_config(mode: &str, databases: &[String]) -> Result<Self> {
        let names: HashSet<String> = databases
            .iter()
            .map(|db| db.trim().to_lowercase())
            .filter(|db| !db.is_empty())
            .collect();

        match mode.to_lowercase().as_str() {
            "whitelist" | "allow" => {
                if names.is_empty() {
                    return Err(Error::Config(
                        "Whitelist mode requires at least one database".into(),
                    ));
                }
                Ok(Self::Whitelist(names))
            }
            "blacklist" | "deny" | "" => {
                let mut denied = names;
                denied.extend(RESERVED_DATABASES.iter().map(|db| (*db).to_string()));
                Ok(Self::Blacklist(denied))
            }
            "none" | "all" => Ok(Self::AllowAll),
            _ => Err(Error::Config(format!(
                "Invalid database filter mode: {mode}. Use 'whitelist', 'blacklist', or 'none'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str) -> std::result::Result<(), Rejection> {
        check_identifier(name, IdentifierKind::Table, &HashSet::new())
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(check("incidents").is_ok());
        assert!(check("cicd_deployments").is_ok());
        assert!(check("_private").is_ok());
        assert!(check("2024_reports").is_ok());
        assert!(check(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_invalid_characters() {
        for name in ["users; DROP", "a-b", "a.b", "`x`", "name'", "a b", "tåble"] {
            let err = check(name).unwrap_err();
            assert_eq!(err.category, RejectionCategory::IdentifierViolation, "{name}");
        }
    }

    #[test]
    fn test_empty_and_too_long() {
        assert!(check("").is_err());
        assert!(check(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_reserved_keyword() {
        assert!(check("select").is_err());
        assert!(check("Table").is_err());
        assert!(check("selection").is_ok());
    }

    #[test]
    fn test_blocked_words() {
        let blocked: HashSet<String> = ["DROP".to_string()].into();
        let result = check_identifier("drop", IdentifierKind::Column, &blocked);
        assert!(result.is_err());
        assert!(check_identifier("dropped", IdentifierKind::Column, &blocked).is_ok());
    }

    #[test]
    fn test_default_filter_blocks_reserved_databases() {
        let filter = DatabaseFilter::default();
        assert!(!filter.is_allowed("mysql"));
        assert!(!filter.is_allowed("INFORMATION_SCHEMA"));
        assert!(!filter.is_allowed("tmp"));
        assert!(filter.is_allowed("lake"));
    }

    #[test]
    fn test_whitelist() {
        let filter = DatabaseFilter::from_config("whitelist", &["Lake".to_string()]).unwrap();
        assert!(filter.is_allowed("lake"));
        assert!(!filter.is_allowed("other"));
        assert!(filter.check("other").is_err());
    }

    #[test]
    fn test_blacklist_keeps_reserved() {
        let filter = DatabaseFilter::from_config("blacklist", &["secrets".to_string()]).unwrap();
        assert!(!filter.is_allowed("secrets"));
        assert!(!filter.is_allowed("sys"));
        assert!(filter.is_allowed("lake"));
    }

    #[test]
    fn test_from_config_none() {
        let filter = DatabaseFilter::from_config("none", &[]).unwrap();
        assert!(filter.is_allowed("mysql"));
    }

    #[test]
    fn test_from_config_errors() {
        assert!(DatabaseFilter::from_config("whitelist", &[]).is_err());
        assert!(DatabaseFilter::from_config("sometimes", &[]).is_err());
    }
}
