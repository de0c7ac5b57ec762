//! Read-only query validation
//!
//! Every free-form query passes through [`QueryValidator::check`] before it
//! may reach a database connection. The rules run in a fixed order and the
//! first failing rule decides the rejection category:
//!
//! 1. length bound
//! 2. statement type (must start with `SELECT`)
//! 3. forbidden keywords, matched on whole tokens
//! 4. structural anomalies (stacked statements, unbalanced quotes or
//!    parentheses, comment truncation, tautologies)
//!
//! Identifiers passed as separate arguments are checked by
//! [`QueryValidator::check_identifier`].

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::ops::Range;

use sha2::{Digest, Sha256};

use super::identifier::{DatabaseFilter, IdentifierKind, check_identifier};
use super::tokenizer::{Token, TokenKind, tokenize};
use crate::error::{Rejection, RejectionCategory};
use crate::observability::AUDIT_TARGET;

/// Keywords refused anywhere in a query, grouped by what they do
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    // data mutation
    "INSERT", "UPDATE", "DELETE", "MERGE", "UPSERT", "INTO", "OUTFILE", "DUMPFILE",
    // schema mutation
    "DROP", "CREATE", "ALTER", "TRUNCATE", "RENAME",
    // privileges and server control
    "GRANT", "REVOKE", "BACKUP", "RESTORE", "SHUTDOWN", "KILL", "LOCK", "UNLOCK",
    // procedural execution and side-channel functions
    "EXEC", "EXECUTE", "CALL", "PREPARE", "DEALLOCATE", "HANDLER", "LOAD", "PROCEDURE",
    "XP_CMDSHELL", "LOAD_FILE", "SLEEP", "BENCHMARK",
];

const COMPARISON_OPERATORS: &[&str] = &["=", "<>", "!=", "<=>", "<", ">", "<=", ">="];

/// Words that end a predicate inside a `WHERE`, `ON` or `HAVING` clause
const PREDICATE_TERMINATORS: &[&str] = &[
    "GROUP", "ORDER", "HAVING", "LIMIT", "UNION", "WINDOW", "THEN", "ELSE", "END",
];

const AUDIT_EXCERPT_CHARS: usize = 64;

/// Validator tunables
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub max_query_length: NonZeroUsize,
    pub extra_forbidden_keywords: Vec<String>,
    pub database_filter: DatabaseFilter,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_query_length: NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN),
            extra_forbidden_keywords: Vec::new(),
            database_filter: DatabaseFilter::default(),
        }
    }
}

/// Outcome of validating one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub allowed: bool,
    pub category: Option<RejectionCategory>,
    pub detail: String,
}

impl ValidationResult {
    fn accepted() -> Self {
        Self {
            allowed: true,
            category: None,
            detail: "query accepted".to_string(),
        }
    }
}

impl From<&Rejection> for ValidationResult {
    fn from(rejection: &Rejection) -> Self {
        Self {
            allowed: false,
            category: Some(rejection.category),
            detail: if rejection.injection {
                "query matched a known injection pattern".to_string()
            } else {
                rejection.detail.clone()
            },
        }
    }
}

/// A query that passed every validation rule.
///
/// Only [`QueryValidator::check`] constructs this type, so holding one is
/// proof that the text was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    raw: String,
    normalized: String,
    statement: String,
    row_bound: RowBound,
}

/// Top-level `LIMIT` of an accepted statement
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowBound {
    Unbounded,
    /// Literal row count at `span` within the statement
    Count { span: Range<usize>, rows: u64 },
    /// Count the validator cannot read, such as a variable
    Opaque,
}

impl ValidatedQuery {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Comment-free token stream with upper-cased keywords, single-spaced
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Statement text with leading comments and the trailing separator removed
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Whether the statement already carries a top-level `LIMIT`
    pub const fn has_row_bound(&self) -> bool {
        !matches!(self.row_bound, RowBound::Unbounded)
    }

    /// Statement text to send to the server, returning at most `max_rows`.
    ///
    /// A literal `LIMIT` count is lowered to `max_rows` in place; any other
    /// statement gets an outer cap.
    pub fn bounded_sql(&self, max_rows: u64) -> String {
        match &self.row_bound {
            RowBound::Unbounded => format!("{} LIMIT {max_rows}", self.statement),
            RowBound::Count { span, rows } => {
                let mut sql = self.statement.clone();
                sql.replace_range(span.clone(), &(*rows).min(max_rows).to_string());
                sql
            }
            RowBound::Opaque => format!(
                "SELECT * FROM ({}) AS bounded LIMIT {max_rows}",
                self.statement
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryValidator {
    max_query_length: usize,
    forbidden: HashSet<String>,
    database_filter: DatabaseFilter,
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new(&ValidatorConfig::default())
    }
}

impl QueryValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        let forbidden = FORBIDDEN_KEYWORDS
            .iter()
            .map(|kw| (*kw).to_string())
            .chain(
                config
                    .extra_forbidden_keywords
                    .iter()
                    .map(|kw| kw.trim().to_ascii_uppercase())
                    .filter(|kw| !kw.is_empty()),
            )
            .collect();

        Self {
            max_query_length: config.max_query_length.get(),
            forbidden,
            database_filter: config.database_filter.clone(),
        }
    }

    /// Classify `raw` as allowed or rejected.
    pub fn validate(&self, raw: &str) -> ValidationResult {
        match self.check(raw) {
            Ok(_) => ValidationResult::accepted(),
            Err(rejection) => ValidationResult::from(&rejection),
        }
    }

    /// Validate `raw`, returning the accepted query or the rejection.
    ///
    /// Rejections are written to the audit log.
    pub fn check(&self, raw: &str) -> Result<ValidatedQuery, Rejection> {
        self.classify(raw).inspect_err(|rejection| audit_rejection(raw, rejection))
    }

    /// Validate an identifier argument; database names also pass the
    /// configured database filter.
    pub fn check_identifier(&self, name: &str, kind: IdentifierKind) -> Result<(), Rejection> {
        let result = check_identifier(name, kind, &self.forbidden).and_then(|()| {
            if kind == IdentifierKind::Database {
                self.database_filter.check(name)
            } else {
                Ok(())
            }
        });
        result.inspect_err(|rejection| audit_rejection(name, rejection))
    }

    pub const fn database_filter(&self) -> &DatabaseFilter {
        &self.database_filter
    }

    pub fn validate_identifier(&self, name: &str, kind: IdentifierKind) -> ValidationResult {
        match self.check_identifier(name, kind) {
            Ok(()) => ValidationResult::accepted(),
            Err(rejection) => ValidationResult::from(&rejection),
        }
    }

    fn classify(&self, raw: &str) -> Result<ValidatedQuery, Rejection> {
        let length = raw.chars().count();
        if length > self.max_query_length {
            return Err(Rejection::new(
                RejectionCategory::LengthExceeded,
                format!(
                    "query is {length} characters, limit is {}",
                    self.max_query_length
                ),
            ));
        }

        let tokens = tokenize(raw);
        let first = check_statement_type(&tokens)?;
        self.check_forbidden_keywords(&tokens)?;
        check_structure(&tokens, first)?;

        Ok(build_validated(raw, &tokens, first))
    }

    /// Scans the first statement only; anything after a separator is a
    /// structural anomaly regardless of its keywords.
    fn check_forbidden_keywords(&self, tokens: &[Token<'_>]) -> Result<(), Rejection> {
        let first_statement = tokens
            .iter()
            .take_while(|t| t.kind != TokenKind::Semicolon);
        for token in first_statement.filter(|t| t.kind == TokenKind::Word) {
            let upper = token.text.to_ascii_uppercase();
            if self.forbidden.contains(&upper) {
                return Err(Rejection::new(
                    RejectionCategory::ForbiddenKeyword,
                    format!("keyword {upper} is not allowed; only read-only SELECT queries are accepted"),
                ));
            }
        }
        Ok(())
    }
}

/// Index of the first significant token, which must be `SELECT`.
fn check_statement_type(tokens: &[Token<'_>]) -> Result<usize, Rejection> {
    let Some(first) = tokens.iter().position(|t| !t.is_comment()) else {
        return Err(Rejection::new(
            RejectionCategory::StatementTypeViolation,
            "query is empty",
        ));
    };

    if tokens[first].is_word("SELECT") {
        Ok(first)
    } else {
        let leading: String = tokens[first].text.chars().take(32).collect();
        Err(Rejection::new(
            RejectionCategory::StatementTypeViolation,
            format!("query must start with SELECT, found '{leading}'"),
        ))
    }
}

fn check_structure(tokens: &[Token<'_>], first: usize) -> Result<(), Rejection> {
    use RejectionCategory::StructuralAnomaly;

    if let Some(open) = tokens.iter().find(|t| !t.terminated) {
        return Err(match open.kind {
            TokenKind::String | TokenKind::QuotedIdentifier => {
                Rejection::injection(StructuralAnomaly, "unbalanced quotes")
            }
            TokenKind::BlockComment => {
                Rejection::injection(StructuralAnomaly, "unterminated comment")
            }
            _ => Rejection::new(StructuralAnomaly, "query could not be tokenized"),
        });
    }

    if tokens.iter().any(|t| t.kind == TokenKind::ExecutableComment) {
        return Err(Rejection::injection(
            StructuralAnomaly,
            "executable comments are not allowed",
        ));
    }

    let mut depth: i64 = 0;
    for token in tokens {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Rejection::new(StructuralAnomaly, "unbalanced parentheses"));
    }

    if let Some(separator) = tokens.iter().position(|t| t.kind == TokenKind::Semicolon)
        && tokens.len() > separator + 1
    {
        return Err(Rejection::injection(
            StructuralAnomaly,
            "multiple statements are not allowed",
        ));
    }

    if tokens[first..].iter().any(Token::is_comment) {
        return Err(Rejection::injection(
            StructuralAnomaly,
            "comments inside a statement are not allowed",
        ));
    }

    let significant: Vec<&Token<'_>> = tokens[first..].iter().collect();
    if has_tautology(&significant) {
        return Err(Rejection::injection(
            StructuralAnomaly,
            "constant condition after a boolean operator",
        ));
    }

    Ok(())
}

/// Detect `OR 1=1`, `AND 'a'='a'`, `OR x=x`, `OR 'x'` and `OR TRUE` shapes.
///
/// The `AND` of a `BETWEEN ... AND ...` range joins two bounds, not two
/// predicates, and is skipped.
fn has_tautology(tokens: &[&Token<'_>]) -> bool {
    let mut depth = 0usize;
    // Paren depths holding a `BETWEEN` still waiting for its `AND`
    let mut open_ranges: Vec<usize> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                open_ranges.retain(|&d| d < depth);
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }

        if token.is_word("BETWEEN") {
            open_ranges.push(depth);
        } else if token.is_word("AND") && open_ranges.last() == Some(&depth) {
            open_ranges.pop();
        } else if is_connective(token) && is_constant_predicate(&tokens[i + 1..]) {
            return true;
        }
    }
    false
}

fn is_connective(token: &Token<'_>) -> bool {
    ["AND", "OR", "XOR"].iter().any(|w| token.is_word(w))
        || (token.kind == TokenKind::Operator && matches!(token.text, "||" | "&&"))
}

fn ends_predicate(token: &Token<'_>) -> bool {
    matches!(token.kind, TokenKind::RParen | TokenKind::Semicolon)
        || is_connective(token)
        || PREDICATE_TERMINATORS.iter().any(|w| token.is_word(w))
}

/// Whether the predicate opening `rest` always holds: a lone constant, two
/// constants compared, or a column compared with itself.
fn is_constant_predicate(rest: &[&Token<'_>]) -> bool {
    let Some(lhs) = rest.first() else {
        return false;
    };
    if (lhs.is_literal() || lhs.is_word("TRUE"))
        && rest.get(1).is_none_or(|next| ends_predicate(next))
    {
        return true;
    }

    let (Some(op), Some(rhs)) = (rest.get(1), rest.get(2)) else {
        return false;
    };
    let is_comparison = (op.kind == TokenKind::Operator
        && COMPARISON_OPERATORS.contains(&op.text))
        || op.is_word("LIKE");
    if !is_comparison {
        return false;
    }

    let literal_pair = lhs.is_literal() && rhs.is_literal();
    let same_operand = matches!(lhs.kind, TokenKind::Word | TokenKind::QuotedIdentifier)
        && lhs.kind == rhs.kind
        && lhs.text.eq_ignore_ascii_case(rhs.text)
        && !rest.get(3).is_some_and(|next| next.kind == TokenKind::Dot);
    literal_pair || same_operand
}

fn build_validated(raw: &str, tokens: &[Token<'_>], first: usize) -> ValidatedQuery {
    let mut body: Vec<&Token<'_>> = tokens[first..].iter().collect();
    if body.last().is_some_and(|t| t.kind == TokenKind::Semicolon) {
        body.pop();
    }

    let start = body.first().map_or(0, |t| t.offset);
    let end = body.last().map_or(start, |t| t.end());

    let mut normalized = String::with_capacity(end - start);
    let mut depth = 0usize;
    let mut row_bound = RowBound::Unbounded;
    for (i, token) in body.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            TokenKind::Word if depth == 0 && token.is_word("LIMIT") => {
                row_bound = read_row_bound(&body[i + 1..], start);
            }
            _ => {}
        }
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        if token.kind == TokenKind::Word {
            normalized.push_str(&token.text.to_ascii_uppercase());
        } else {
            normalized.push_str(token.text);
        }
    }

    ValidatedQuery {
        raw: raw.to_string(),
        normalized,
        statement: raw[start..end].to_string(),
        row_bound,
    }
}

/// Locate the row count after `LIMIT`: `LIMIT n`, `LIMIT n OFFSET m` or
/// `LIMIT m, n`. Spans are relative to the statement start.
fn read_row_bound(after_limit: &[&Token<'_>], start: usize) -> RowBound {
    let count = match after_limit {
        [_, comma, count, ..] if comma.kind == TokenKind::Comma => count,
        [count, ..] => count,
        [] => return RowBound::Opaque,
    };
    if count.kind != TokenKind::Number {
        return RowBound::Opaque;
    }
    count.text.parse().map_or(RowBound::Opaque, |rows| RowBound::Count {
        span: count.offset - start..count.end() - start,
        rows,
    })
}

/// First 16 hex characters of the SHA-256 of `raw`
pub fn fingerprint(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(&digest[..8])
}

fn audit_rejection(raw: &str, rejection: &Rejection) {
    let mut excerpt = String::new();
    if !rejection.injection {
        excerpt.extend(raw.chars().take(AUDIT_EXCERPT_CHARS));
        if raw.chars().count() > AUDIT_EXCERPT_CHARS {
            excerpt.push_str("...");
        }
    }

    tracing::warn!(
        target: AUDIT_TARGET,
        event = "query_rejected",
        category = %rejection.category,
        fingerprint = %fingerprint(raw),
        length = raw.len(),
        injection = rejection.injection,
        excerpt = %excerpt,
        "Query rejected: {}",
        if rejection.injection { "matched injection idiom" } else { rejection.detail.as_str() }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> QueryValidator {
        QueryValidator::default()
    }

    fn category(sql: &str) -> Option<RejectionCategory> {
        validator().validate(sql).category
    }

    #[test]
    fn test_accepts_plain_select() {
        let result = validator().validate("select id,title from incidents where status='OPEN' limit 10");
        assert!(result.allowed);
        assert!(result.category.is_none());
    }

    #[test]
    fn test_stacked_drop_is_structural_anomaly() {
        let result = validator().validate("SELECT * FROM incidents; DROP TABLE incidents;");
        assert!(!result.allowed);
        assert_eq!(result.category, Some(RejectionCategory::StructuralAnomaly));
    }

    #[test]
    fn test_length_bound_comes_first() {
        let config = ValidatorConfig {
            max_query_length: NonZeroUsize::new(20).unwrap(),
            ..ValidatorConfig::default()
        };
        let validator = QueryValidator::new(&config);
        let result = validator.validate("DROP TABLE incidents_with_a_long_name");
        assert_eq!(result.category, Some(RejectionCategory::LengthExceeded));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let config = ValidatorConfig {
            max_query_length: NonZeroUsize::new(20).unwrap(),
            ..ValidatorConfig::default()
        };
        let validator = QueryValidator::new(&config);
        assert!(validator.validate("SELECT 'ééééééé'").allowed);
    }

    #[test]
    fn test_statement_type() {
        for sql in [
            "INSERT INTO t VALUES (1)",
            "update t set a = 1",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "SHOW TABLES",
            "(SELECT 1)",
            "",
            "   ",
            "-- only a comment",
        ] {
            assert_eq!(
                category(sql),
                Some(RejectionCategory::StatementTypeViolation),
                "{sql:?}"
            );
        }
    }

    #[test]
    fn test_leading_comments_are_stripped() {
        assert!(validator().validate("/* report */ -- daily\nSELECT 1").allowed);
        assert!(validator().validate("\n\t  SELECT 1").allowed);
    }

    #[test]
    fn test_forbidden_keywords_match_whole_tokens() {
        assert_eq!(
            category("SELECT * FROM t WHERE id IN (SELECT id FROM u) UNION SELECT 1 FROM x WHERE delete = 1"),
            Some(RejectionCategory::ForbiddenKeyword)
        );
        assert!(validator().validate("SELECT created_date, updated_at, deleted FROM incidents").allowed);
        assert!(validator().validate("SELECT `update` FROM t").allowed);
        assert!(validator().validate("SELECT 'drop table' AS note").allowed);
    }

    #[test]
    fn test_forbidden_keyword_case_insensitive() {
        assert_eq!(
            category("SELECT SlEeP(5)"),
            Some(RejectionCategory::ForbiddenKeyword)
        );
        assert_eq!(
            category("SELECT * FROM t INTO OUTFILE '/tmp/x'"),
            Some(RejectionCategory::ForbiddenKeyword)
        );
    }

    #[test]
    fn test_extra_forbidden_keywords() {
        let config = ValidatorConfig {
            extra_forbidden_keywords: vec![" get_lock ".to_string()],
            ..ValidatorConfig::default()
        };
        let validator = QueryValidator::new(&config);
        assert_eq!(
            validator.validate("SELECT GET_LOCK('x', 1)").category,
            Some(RejectionCategory::ForbiddenKeyword)
        );
    }

    #[test]
    fn test_structural_anomalies() {
        for sql in [
            "SELECT * FROM t WHERE name = 'abc",
            "SELECT * FROM t WHERE (a = 1",
            "SELECT * FROM t WHERE a = 1)",
            "SELECT 1; SELECT 2",
            "SELECT * FROM users WHERE name = 'admin' -- ' AND pass = 'x'",
            "SELECT * FROM t /* hidden */ WHERE 1",
            "SELECT * FROM t WHERE id = 1 OR 1=1",
            "SELECT * FROM t WHERE id = 1 or 'a'='a'",
            "SELECT * FROM t WHERE id = 1 AND 2 > 1",
            "SELECT * FROM t WHERE id = 1 OR id = id",
            "SELECT * FROM t WHERE a = 1 OR TRUE",
            "SELECT * FROM t WHERE a = 1 || 1 = 1",
            "SELECT /*!50000 1 */",
            "SELECT 1 /* open",
        ] {
            assert_eq!(
                category(sql),
                Some(RejectionCategory::StructuralAnomaly),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_legitimate_conditions_pass() {
        for sql in [
            "SELECT * FROM t WHERE a = 1 OR b = 2",
            "SELECT * FROM t WHERE a.id = b.id OR a.x = 3",
            "SELECT * FROM t1 JOIN t2 ON t1.id = t2.id AND t1.env = 'PRODUCTION'",
            "SELECT COUNT(*) FROM lake.cicd_deployments WHERE environment = \"PRODUCTION\"",
            "SELECT * FROM t WHERE 1=1",
            "SELECT a FROM t UNION SELECT b FROM u",
            "SELECT 1;",
            "SELECT 1 ;  ",
        ] {
            assert!(validator().validate(sql).allowed, "{sql}");
        }
    }

    #[test]
    fn test_constants_in_ordinary_predicates_pass() {
        for sql in [
            "SELECT * FROM cicd_deployments WHERE created_date BETWEEN '2024-01-01' AND '2024-12-31'",
            "SELECT * FROM cicd_deployments WHERE 'PRODUCTION' = environment AND 'SUCCESS' = result",
            "SELECT * FROM issues WHERE status = 'OPEN' OR 'DONE' = status",
            "SELECT * FROM t WHERE a NOT BETWEEN 1 AND 5 AND b = 2",
            "SELECT * FROM t WHERE (d BETWEEN 1 AND 2) OR (d BETWEEN 5 AND 9)",
            "SELECT CASE WHEN a = 1 AND b = 2 THEN 'x' ELSE 'y' END FROM t",
        ] {
            let result = validator().validate(sql);
            assert!(result.allowed, "{sql}: {}", result.detail);
        }
    }

    #[test]
    fn test_tautology_after_between_range() {
        for sql in [
            "SELECT * FROM t WHERE d BETWEEN 1 AND 5 OR 1 = 1",
            "SELECT * FROM t WHERE d BETWEEN 1 AND 5 AND 'x'",
            "SELECT * FROM t WHERE a = 1 OR 'x'",
            "SELECT * FROM t WHERE a = 1 OR 1 ORDER BY a",
        ] {
            assert_eq!(
                category(sql),
                Some(RejectionCategory::StructuralAnomaly),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_unterminated_identifier_is_structural() {
        let result = validator().validate("SELECT `a");
        assert_eq!(result.category, Some(RejectionCategory::StructuralAnomaly));
    }

    #[test]
    fn test_rejection_detail_hides_injection_text() {
        let result = validator().validate("SELECT * FROM t WHERE id = 1 OR 1=1");
        assert!(!result.allowed);
        assert!(!result.detail.contains("1=1"));
    }

    #[test]
    fn test_validated_query_statement_and_bound() {
        let query = validator()
            .check("-- lead\n  select id from incidents;  ")
            .unwrap();
        assert_eq!(query.statement(), "select id from incidents");
        assert_eq!(query.normalized(), "SELECT ID FROM INCIDENTS");
        assert!(!query.has_row_bound());
        assert_eq!(query.bounded_sql(101), "select id from incidents LIMIT 101");
    }

    #[test]
    fn test_limit_inside_subquery_is_not_a_bound() {
        let query = validator()
            .check("SELECT * FROM (SELECT id FROM t LIMIT 5) AS x")
            .unwrap();
        assert!(!query.has_row_bound());

        let query = validator().check("SELECT id FROM t LIMIT 10").unwrap();
        assert!(query.has_row_bound());
        assert_eq!(query.bounded_sql(1001), "SELECT id FROM t LIMIT 10");
    }

    #[test]
    fn test_statement_limit_is_capped() {
        let check = |sql: &str| validator().check(sql).unwrap();

        assert_eq!(
            check("SELECT * FROM incidents LIMIT 100000000").bounded_sql(101),
            "SELECT * FROM incidents LIMIT 101"
        );
        assert_eq!(
            check("SELECT * FROM t ORDER BY id limit 5000 offset 20").bounded_sql(11),
            "SELECT * FROM t ORDER BY id limit 11 offset 20"
        );
        assert_eq!(
            check("SELECT * FROM t LIMIT 20, 5000").bounded_sql(11),
            "SELECT * FROM t LIMIT 20, 11"
        );
        assert_eq!(
            check("SELECT * FROM (SELECT id FROM t LIMIT 5) AS x LIMIT 3").bounded_sql(11),
            "SELECT * FROM (SELECT id FROM t LIMIT 5) AS x LIMIT 3"
        );
    }

    #[test]
    fn test_unreadable_limit_is_wrapped() {
        let query = validator().check("SELECT id FROM t LIMIT @n").unwrap();
        assert!(query.has_row_bound());
        assert_eq!(
            query.bounded_sql(11),
            "SELECT * FROM (SELECT id FROM t LIMIT @n) AS bounded LIMIT 11"
        );
    }

    #[test]
    fn test_identifier_validation() {
        let validator = validator();
        assert!(validator.validate_identifier("lake", IdentifierKind::Database).allowed);
        assert_eq!(
            validator
                .validate_identifier("mysql", IdentifierKind::Database)
                .category,
            Some(RejectionCategory::IdentifierViolation)
        );
        assert_eq!(
            validator
                .validate_identifier("drop", IdentifierKind::Table)
                .category,
            Some(RejectionCategory::IdentifierViolation)
        );
        assert!(validator.validate_identifier("incidents", IdentifierKind::Table).allowed);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint("SELECT 1"), fingerprint("SELECT 1"));
        assert_ne!(fingerprint("SELECT 1"), fingerprint("SELECT 2"));
        assert_eq!(fingerprint("SELECT 1").len(), 16);
    }
}
