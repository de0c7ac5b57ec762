//! Accept/reject corpus for the query validator

use devlake_mcp::security::{IdentifierKind, ValidatorConfig};
use devlake_mcp::{QueryValidator, RejectionCategory};

const ACCEPTED: &[&str] = &[
    "SELECT 1",
    "select id,title from incidents where status='OPEN' limit 10",
    "select * from incidents",
    "SELECT id, title FROM incidents WHERE status = 'OPEN' ORDER BY id DESC LIMIT 20",
    "SELECT COUNT(*) AS total FROM pull_requests GROUP BY repo_id HAVING COUNT(*) > 5",
    "SELECT i.id, p.name FROM incidents i JOIN projects p ON p.id = i.project_id",
    "SELECT * FROM (SELECT id FROM issues WHERE priority = 'HIGH') AS t",
    "SELECT title FROM issues WHERE title LIKE '%drop table%'",
    "SELECT 'DELETE' AS action_label",
    "SELECT `update` FROM audit_columns",
    "SELECT created_date FROM deployments WHERE created_date > NOW() - INTERVAL 7 DAY",
    "SELECT id FROM incidents;",
    "  SELECT id FROM incidents  ",
    "SELECT updated_at, deleted_flag FROM commits",
    "SELECT id FROM cicd_deployments WHERE created_date BETWEEN '2024-01-01' AND '2024-12-31'",
    "SELECT id FROM cicd_deployments WHERE 'PRODUCTION' = environment AND 'SUCCESS' = result",
    "SELECT id FROM issues WHERE status = 'OPEN' OR 'DONE' = status",
    "SELECT id FROM issues WHERE type IN ('BUG', 'INCIDENT') AND status = 'OPEN'",
    "SELECT CASE WHEN status = 'DONE' THEN 'closed' ELSE 'open' END AS state FROM issues",
    "SELECT id FROM issues WHERE title LIKE 'abc%' OR title LIKE 'd%'",
    "SELECT id FROM pull_requests WHERE merged_date NOT BETWEEN '2024-01-01' AND '2024-06-30' OR status = 'OPEN'",
];

/// Ordinary predicates; any of them joined by `AND`/`OR` must stay accepted
const PREDICATES: &[&str] = &[
    "status = 'OPEN'",
    "created_date BETWEEN '2024-01-01' AND '2024-12-31'",
    "'PRODUCTION' = environment",
    "type IN ('BUG', 'INCIDENT')",
    "title LIKE 'abc%'",
    "lead_time_minutes > 60",
    "(priority = 'HIGH' OR severity BETWEEN 1 AND 2)",
    "resolution_date IS NOT NULL",
];

const REJECTED: &[(&str, RejectionCategory)] = &[
    ("", RejectionCategory::StatementTypeViolation),
    ("   ", RejectionCategory::StatementTypeViolation),
    ("DELETE FROM incidents", RejectionCategory::StatementTypeViolation),
    ("UPDATE incidents SET status = 'DONE'", RejectionCategory::StatementTypeViolation),
    ("SHOW TABLES", RejectionCategory::StatementTypeViolation),
    ("WITH x AS (SELECT 1) SELECT * FROM x", RejectionCategory::StatementTypeViolation),
    ("SELECT * INTO OUTFILE '/tmp/x' FROM users", RejectionCategory::ForbiddenKeyword),
    ("SELECT SLEEP(10)", RejectionCategory::ForbiddenKeyword),
    ("SELECT BENCHMARK(1000000, MD5('x'))", RejectionCategory::ForbiddenKeyword),
    ("SELECT LOAD_FILE('/etc/passwd')", RejectionCategory::ForbiddenKeyword),
    ("SELECT * FROM incidents; DROP TABLE incidents;", RejectionCategory::StructuralAnomaly),
    ("SELECT 1; DROP TABLE users", RejectionCategory::StructuralAnomaly),
    ("SELECT 1; SELECT 2", RejectionCategory::StructuralAnomaly),
    ("SELECT * FROM users WHERE id = 1 OR 1=1", RejectionCategory::StructuralAnomaly),
    ("SELECT * FROM users WHERE name = '' OR 'a'='a'", RejectionCategory::StructuralAnomaly),
    ("SELECT * FROM users WHERE id = 1 -- trailing", RejectionCategory::StructuralAnomaly),
    ("SELECT * FROM users /* hidden */ WHERE id = 1", RejectionCategory::StructuralAnomaly),
    ("SELECT /*!50000 1 */", RejectionCategory::StructuralAnomaly),
    ("SELECT * FROM users WHERE name = 'open", RejectionCategory::StructuralAnomaly),
    ("SELECT COUNT((id) FROM users", RejectionCategory::StructuralAnomaly),
];

#[test]
fn test_accepted_corpus() {
    let validator = QueryValidator::default();
    for query in ACCEPTED {
        let result = validator.validate(query);
        assert!(result.allowed, "{query:?} was rejected: {:?}", result.detail);
        assert!(result.category.is_none());
    }
}

#[test]
fn test_rejected_corpus() {
    let validator = QueryValidator::default();
    for (query, expected) in REJECTED {
        let result = validator.validate(query);
        assert!(!result.allowed, "{query:?} was accepted");
        assert_eq!(result.category, Some(*expected), "{query:?}");
        assert!(!result.detail.is_empty());
    }
}

#[test]
fn test_joined_predicates_are_accepted() {
    let validator = QueryValidator::default();
    for left in PREDICATES {
        for right in PREDICATES {
            for connective in ["AND", "OR", "and", "or"] {
                let query = format!("SELECT id FROM issues WHERE {left} {connective} {right}");
                let result = validator.validate(&query);
                assert!(result.allowed, "{query:?} was rejected: {:?}", result.detail);
            }
        }
    }
}

#[test]
fn test_validation_is_deterministic() {
    let validator = QueryValidator::default();
    for query in ACCEPTED.iter().chain(REJECTED.iter().map(|(q, _)| q)) {
        assert_eq!(validator.validate(query), validator.validate(query), "{query:?}");
    }
}

#[test]
fn test_length_limit() {
    let config = ValidatorConfig {
        max_query_length: std::num::NonZeroUsize::new(32).unwrap(),
        ..ValidatorConfig::default()
    };
    let validator = QueryValidator::new(&config);

    assert!(validator.validate("SELECT id FROM incidents").allowed);
    let long = format!("SELECT id FROM incidents WHERE title = '{}'", "x".repeat(64));
    assert_eq!(
        validator.validate(&long).category,
        Some(RejectionCategory::LengthExceeded)
    );
}

#[test]
fn test_extra_forbidden_keywords() {
    let config = ValidatorConfig {
        extra_forbidden_keywords: vec!["secrets".to_string()],
        ..ValidatorConfig::default()
    };
    let validator = QueryValidator::new(&config);

    assert_eq!(
        validator.validate("SELECT * FROM secrets").category,
        Some(RejectionCategory::ForbiddenKeyword)
    );
    assert!(QueryValidator::default().validate("SELECT * FROM secrets").allowed);
}

#[test]
fn test_identifiers() {
    let validator = QueryValidator::default();

    for name in ["lake", "cicd_deployments", "_tmp2"] {
        assert!(validator.validate_identifier(name, IdentifierKind::Table).allowed, "{name}");
    }
    for name in ["", "lake;drop", "a b", "x'--", "drop"] {
        let result = validator.validate_identifier(name, IdentifierKind::Table);
        assert_eq!(
            result.category,
            Some(RejectionCategory::IdentifierViolation),
            "{name:?}"
        );
    }

    assert!(!validator.validate_identifier("mysql", IdentifierKind::Database).allowed);
    assert!(!validator.validate_identifier("information_schema", IdentifierKind::Database).allowed);
    assert!(validator.validate_identifier("lake", IdentifierKind::Database).allowed);
}
