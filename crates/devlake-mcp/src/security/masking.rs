//! Sensitive-data masking for query results
//!
//! Masking walks JSON structurally and rewrites every string through an
//! ordered list of [`MaskingRule`]s, most specific first. Replacements keep
//! a recognizable shape (email domain, last four digits) but never match any
//! detector again, so masking is idempotent.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::db::{ResultSet, SqlValue};
use crate::Error;

/// Placeholder for values that cannot be masked safely
pub const REDACTED: &str = "[REDACTED]";

/// Upper bound on rule passes before a string is redacted outright
const MAX_PASSES: usize = 4;

/// How a detected match is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// `john.doe@example.com` -> `joh***@example.com`
    EmailLocalPart,
    /// Fixed prefix followed by the last four digits of the match
    KeepLastFour(&'static str),
    /// Replace the whole match
    Fixed(&'static str),
}

#[derive(Debug)]
pub struct MaskingRule {
    pub name: &'static str,
    detector: Regex,
    replacement: Replacement,
}

impl MaskingRule {
    fn new(
        name: &'static str,
        pattern: &str,
        replacement: Replacement,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            detector: Regex::new(pattern)?,
            replacement,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.detector.is_match(text)
    }

    fn apply(&self, text: &str) -> String {
        self.detector
            .replace_all(text, |caps: &Captures<'_>| {
                let matched = &caps[0];
                match self.replacement {
                    Replacement::EmailLocalPart => {
                        let (local, domain) = matched.split_once('@').unwrap_or((matched, ""));
                        let visible: String = local.chars().take(3).collect();
                        format!("{visible}***@{domain}")
                    }
                    Replacement::KeepLastFour(prefix) => {
                        let digits: Vec<char> =
                            matched.chars().filter(char::is_ascii_digit).collect();
                        let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
                        format!("{prefix}{tail}")
                    }
                    Replacement::Fixed(placeholder) => placeholder.to_string(),
                }
            })
            .into_owned()
    }
}

const OCTET: &str = r"(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)";

/// Built-in detectors, most specific first
static DEFAULT_RULES: LazyLock<Result<Vec<MaskingRule>, regex::Error>> = LazyLock::new(|| {
    [
        MaskingRule::new(
            "email",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            Replacement::EmailLocalPart,
        ),
        MaskingRule::new(
            "payment_card",
            r"\b(?:\d{4}[- ]?){3}\d{4}\b",
            Replacement::KeepLastFour("****-****-****-"),
        ),
        MaskingRule::new(
            "national_id",
            r"\b\d{3}-\d{2}-\d{4}\b",
            Replacement::KeepLastFour("***-**-"),
        ),
        MaskingRule::new(
            "ipv4",
            &format!(r"\b(?:{OCTET}\.){{3}}{OCTET}\b"),
            Replacement::Fixed("***.***.***.***"),
        ),
        MaskingRule::new(
            "phone",
            r"(?:\+\d{1,3}[ .-]?)?(?:\(\d{3}\)[ .-]?|\b\d{3}[ .-]?)\d{3}[ .-]?\d{4}\b",
            Replacement::KeepLastFour("***-***-"),
        ),
    ]
    .into_iter()
    .collect()
});

/// Masked rows ready to leave the pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedResult {
    pub rows: Vec<Map<String, Value>>,
    pub truncated: bool,
    pub effective_limit: u32,
}

impl MaskedResult {
    /// Result carrying a single row built from already-masked values
    pub(crate) fn single(row: Map<String, Value>) -> Self {
        Self {
            rows: vec![row],
            truncated: false,
            effective_limit: 1,
        }
    }

    pub const fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Applies the masking rules to strings, JSON values and result sets
#[derive(Debug, Clone, Copy)]
pub struct Masker {
    rules: &'static [MaskingRule],
}

impl Masker {
    /// Masker over the built-in rules.
    pub fn new() -> crate::Result<Self> {
        match &*DEFAULT_RULES {
            Ok(rules) => Ok(Self {
                rules: rules.as_slice(),
            }),
            Err(e) => Err(Error::Config(format!("invalid masking rule: {e}"))),
        }
    }

    pub const fn rules(&self) -> &'static [MaskingRule] {
        self.rules
    }

    /// Mask a string, repeating the rules until nothing changes.
    pub fn mask_text(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_PASSES {
            let next = self
                .rules
                .iter()
                .fold(current.clone(), |acc, rule| rule.apply(&acc));
            if next == current {
                return current;
            }
            current = next;
        }

        tracing::warn!(
            length = text.len(),
            "Masking did not converge, redacting value"
        );
        REDACTED.to_string()
    }

    /// Structurally mask any JSON value.
    pub fn mask(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.mask_text(text)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.mask(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, v)| (key.clone(), self.mask(v)))
                    .collect(),
            ),
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        }
    }

    /// Convert one database cell to masked JSON.
    pub fn mask_cell(&self, column: &str, cell: &SqlValue) -> Value {
        match cell {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::Number((*i).into()),
            SqlValue::UInt(u) => Value::Number((*u).into()),
            SqlValue::Float(f) => Number::from_f64(*f).map_or_else(
                || {
                    tracing::warn!(column, value = %f, "Non-finite float coerced to text");
                    Value::String(f.to_string())
                },
                Value::Number,
            ),
            SqlValue::Decimal(text) | SqlValue::Text(text) => Value::String(self.mask_text(text)),
            SqlValue::Bytes(bytes) => {
                tracing::warn!(
                    column,
                    length = bytes.len(),
                    "Binary value cannot be masked, redacting"
                );
                Value::String(REDACTED.to_string())
            }
            temporal @ (SqlValue::Date(_) | SqlValue::DateTime(_) | SqlValue::Time { .. }) => {
                Value::String(temporal.canonical_temporal().unwrap_or_default())
            }
        }
    }

    /// Consume a result set and produce masked JSON rows.
    pub fn mask_result(&self, result: ResultSet) -> MaskedResult {
        let ResultSet {
            columns,
            rows,
            truncated,
            effective_limit,
        } = result;

        let rows = rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .zip(row.iter())
                    .map(|(column, cell)| (column.clone(), self.mask_cell(column, cell)))
                    .collect()
            })
            .collect();

        MaskedResult {
            rows,
            truncated,
            effective_limit,
        }
    }
}
