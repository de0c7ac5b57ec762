//! Backend-neutral scalar and result-set model

use chrono::{NaiveDate, NaiveDateTime};

/// A single cell as returned by a database backend
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact numeric in its textual form
    Decimal(String),
    Text(String),
    /// Binary data that is not valid UTF-8
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// `TIME` column: a signed duration of at most 838 hours
    Time {
        negative: bool,
        hours: u32,
        minutes: u8,
        seconds: u8,
        micros: u32,
    },
}

impl SqlValue {
    /// ISO 8601 text for temporal values, `None` for everything else.
    pub fn canonical_temporal(&self) -> Option<String> {
        match self {
            Self::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
            Self::DateTime(datetime) => Some(datetime.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Self::Time {
                negative,
                hours,
                minutes,
                seconds,
                micros,
            } => {
                let sign = if *negative { "-" } else { "" };
                let mut text = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
                if *micros > 0 {
                    text.push_str(&format!(".{micros:06}"));
                }
                Some(text)
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Rows fetched by a backend, before masking.
///
/// Deliberately not serializable: the only way out of the pipeline is
/// through [`crate::security::Masker::mask_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    /// More rows existed than `effective_limit`
    pub truncated: bool,
    pub effective_limit: u32,
}

impl ResultSet {
    pub const fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            SqlValue::Date(date).canonical_temporal().as_deref(),
            Some("2024-03-09")
        );

        let datetime = date.and_hms_micro_opt(14, 5, 6, 120_000).unwrap();
        assert_eq!(
            SqlValue::DateTime(datetime).canonical_temporal().as_deref(),
            Some("2024-03-09T14:05:06.120")
        );

        let whole = date.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            SqlValue::DateTime(whole).canonical_temporal().as_deref(),
            Some("2024-03-09T00:00:00")
        );
    }

    #[test]
    fn test_time_format() {
        let time = SqlValue::Time {
            negative: true,
            hours: 100,
            minutes: 2,
            seconds: 3,
            micros: 0,
        };
        assert_eq!(time.canonical_temporal().as_deref(), Some("-100:02:03"));

        let time = SqlValue::Time {
            negative: false,
            hours: 1,
            minutes: 0,
            seconds: 0,
            micros: 5,
        };
        assert_eq!(time.canonical_temporal().as_deref(), Some("01:00:00.000005"));
    }

    #[test]
    fn test_non_temporal() {
        assert!(SqlValue::Int(1).canonical_temporal().is_none());
        assert!(SqlValue::Null.is_null());
    }
}
