//! Row-level validation and type coercion.
//!
//! Each row is validated independently; failures become [`ValidationError`]
//! entries instead of aborting the batch. The caller decides, via
//! [`ErrorPolicy`], whether the aggregate is bad enough to fail the whole
//! run before anything is written.

use chrono::NaiveDate;
use common::types::{ColumnSpec, ColumnType, SqlValue, ValueRule};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub use common::types::ErrorPolicy;

/// One malformed field in one input row. Recoverable on its own; only the
/// aggregate, measured against an [`ErrorPolicy`], fails a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub row_index: usize,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(row_index: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row_index,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}, {}: {}", self.row_index, self.field, self.message)
    }
}

/// Outcome of validating a whole batch: the rows that passed, in input
/// order, plus every error for operator review.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub rows: Vec<Vec<SqlValue>>,
    pub errors: Vec<ValidationError>,
    pub rows_scanned: usize,
}

impl ValidationReport {
    /// Number of rows that produced at least one error.
    pub fn failed_rows(&self) -> usize {
        self.rows_scanned - self.rows.len()
    }

    pub fn exceeds(&self, policy: &ErrorPolicy) -> bool {
        policy.exceeded(self.failed_rows(), self.rows_scanned)
    }
}

#[derive(Debug)]
pub enum RuleError {
    /// A `Pattern` rule failed to compile. Raised when the validator is
    /// built, before any row is inspected.
    BadPattern { column: String, message: String },
}

impl Display for RuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleError::BadPattern { column, message } => {
                write!(f, "bad pattern rule on column '{}': {}", column, message)
            }
        }
    }
}

impl std::error::Error for RuleError {}

/// Validator for one integration's column layout. Pattern rules are
/// compiled once here, not per row.
#[derive(Debug)]
pub struct RowValidator<'a> {
    columns: &'a [ColumnSpec],
    patterns: Vec<Option<Regex>>,
}

impl<'a> RowValidator<'a> {
    pub fn new(columns: &'a [ColumnSpec]) -> Result<Self, RuleError> {
        let mut patterns = Vec::with_capacity(columns.len());
        for spec in columns {
            let compiled = match &spec.rule {
                Some(ValueRule::Pattern(pattern)) => {
                    Some(Regex::new(pattern).map_err(|e| RuleError::BadPattern {
                        column: spec.name.clone(),
                        message: e.to_string(),
                    })?)
                }
                _ => None,
            };
            patterns.push(compiled);
        }
        Ok(Self { columns, patterns })
    }

    /// Validate every row. Rows that fail are dropped from the typed
    /// output but fully recorded in the error list.
    pub fn validate_batch(&self, rows: &[Vec<String>]) -> ValidationReport {
        let mut report = ValidationReport {
            rows_scanned: rows.len(),
            ..Default::default()
        };
        for (index, raw) in rows.iter().enumerate() {
            match self.validate_row(index, raw) {
                Ok(typed) => report.rows.push(typed),
                Err(mut errors) => report.errors.append(&mut errors),
            }
        }
        if !report.errors.is_empty() {
            log::warn!(
                "validation produced {} errors across {} of {} rows",
                report.errors.len(),
                report.failed_rows(),
                report.rows_scanned
            );
        }
        report
    }

    /// Validate a single row against the column layout. All failing fields
    /// are reported, not just the first.
    pub fn validate_row(
        &self,
        row_index: usize,
        raw: &[String],
    ) -> Result<Vec<SqlValue>, Vec<ValidationError>> {
        if raw.len() != self.columns.len() {
            return Err(vec![ValidationError::new(
                row_index,
                "<row>",
                format!("expected {} fields, got {}", self.columns.len(), raw.len()),
            )]);
        }

        let mut typed = Vec::with_capacity(raw.len());
        let mut errors = Vec::new();
        for (i, (spec, field)) in self.columns.iter().zip(raw).enumerate() {
            match self.validate_field(row_index, spec, self.patterns[i].as_ref(), field) {
                Ok(value) => typed.push(value),
                Err(err) => errors.push(err),
            }
        }
        if errors.is_empty() {
            Ok(typed)
        } else {
            Err(errors)
        }
    }

    fn validate_field(
        &self,
        row_index: usize,
        spec: &ColumnSpec,
        pattern: Option<&Regex>,
        field: &str,
    ) -> Result<SqlValue, ValidationError> {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return if spec.nullable {
                Ok(SqlValue::Null)
            } else {
                Err(ValidationError::new(
                    row_index,
                    &spec.name,
                    "value is required",
                ))
            };
        }

        let value = coerce(spec.ty, trimmed)
            .map_err(|message| ValidationError::new(row_index, &spec.name, message))?;

        if let Some(rule) = &spec.rule {
            check_rule(rule, pattern, trimmed, &value)
                .map_err(|message| ValidationError::new(row_index, &spec.name, message))?;
        }
        Ok(value)
    }
}

fn coerce(ty: ColumnType, raw: &str) -> Result<SqlValue, String> {
    match ty {
        ColumnType::Text => Ok(SqlValue::Text(raw.to_string())),
        ColumnType::Int => raw
            .parse::<i64>()
            .map(SqlValue::Int)
            .map_err(|_| format!("'{raw}' is not an integer")),
        ColumnType::Decimal => Decimal::from_str(raw)
            .map(SqlValue::Decimal)
            .map_err(|_| format!("'{raw}' is not a decimal")),
        ColumnType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(SqlValue::Date)
            .map_err(|_| format!("'{raw}' is not a date (expected YYYY-MM-DD)")),
    }
}

fn check_rule(
    rule: &ValueRule,
    pattern: Option<&Regex>,
    raw: &str,
    value: &SqlValue,
) -> Result<(), String> {
    match rule {
        ValueRule::Pattern(source) => {
            let regex = pattern.expect("pattern compiled at construction");
            if regex.is_match(raw) {
                Ok(())
            } else {
                Err(format!("'{raw}' does not match pattern '{source}'"))
            }
        }
        ValueRule::MaxLength(max) => {
            if raw.len() <= *max {
                Ok(())
            } else {
                Err(format!("value exceeds max length {max}"))
            }
        }
        ValueRule::Range { min, max } => {
            let within = match value {
                SqlValue::Int(v) => {
                    min.map_or(true, |m| *v >= m) && max.map_or(true, |m| *v <= m)
                }
                SqlValue::Decimal(v) => {
                    min.map_or(true, |m| *v >= Decimal::from(m))
                        && max.map_or(true, |m| *v <= Decimal::from(m))
                }
                _ => true, // range only constrains numeric columns
            };
            if within {
                Ok(())
            } else {
                Err(format!("'{raw}' is outside the allowed range"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("zip3", ColumnType::Text)
                .with_rule(ValueRule::Pattern("^[0-9]{3}$".into())),
            ColumnSpec::new("pop", ColumnType::Int),
            ColumnSpec::new("rate", ColumnType::Decimal).nullable(),
            ColumnSpec::new("effective", ColumnType::Date).nullable(),
        ]
    }

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_row_is_fully_coerced() {
        let columns = columns();
        let validator = RowValidator::new(&columns).unwrap();
        let typed = validator
            .validate_row(0, &row(&["100", "1234", "9.95", "2024-01-01"]))
            .expect("valid row");
        assert_eq!(typed[0], SqlValue::Text("100".into()));
        assert_eq!(typed[1], SqlValue::Int(1234));
        assert_eq!(typed[2], SqlValue::Decimal(Decimal::from_str("9.95").unwrap()));
        assert_eq!(
            typed[3],
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn empty_fields_respect_nullability() {
        let columns = columns();
        let validator = RowValidator::new(&columns).unwrap();

        let typed = validator
            .validate_row(0, &row(&["100", "5", "", ""]))
            .expect("nullable fields may be empty");
        assert_eq!(typed[2], SqlValue::Null);
        assert_eq!(typed[3], SqlValue::Null);

        let errors = validator
            .validate_row(3, &row(&["100", "", "1.0", ""]))
            .expect_err("pop is required");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "pop");
        assert_eq!(errors[0].row_index, 3);
    }

    #[test]
    fn every_bad_field_is_reported() {
        let columns = columns();
        let validator = RowValidator::new(&columns).unwrap();
        let errors = validator
            .validate_row(7, &row(&["10x", "abc", "nope", "01/02/2024"]))
            .expect_err("four bad fields");
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(|e| e.row_index == 7));
    }

    #[test]
    fn arity_mismatch_is_one_row_error() {
        let columns = columns();
        let validator = RowValidator::new(&columns).unwrap();
        let errors = validator
            .validate_row(2, &row(&["100", "5"]))
            .expect_err("short row");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "<row>");
    }

    #[test]
    fn batch_keeps_good_rows_and_all_errors() {
        let columns = columns();
        let validator = RowValidator::new(&columns).unwrap();
        let rows = vec![
            row(&["100", "10", "", ""]),
            row(&["bad", "x", "", ""]),
            row(&["200", "20", "", ""]),
        ];
        let report = validator.validate_batch(&rows);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.failed_rows(), 1);
        assert_eq!(report.errors.len(), 2);
        // 1 of 3 rows failed: over the default 10% ratio
        assert!(report.exceeds(&ErrorPolicy::default()));
        let permissive = ErrorPolicy {
            max_error_count: None,
            max_error_ratio: Some(0.5),
        };
        assert!(!report.exceeds(&permissive));
    }

    #[test]
    fn report_threshold_uses_failed_rows_not_field_errors() {
        let columns = columns();
        let validator = RowValidator::new(&columns).unwrap();
        // one row, four bad fields: still a single failed row
        let report = validator.validate_batch(&[row(&["10x", "abc", "nope", "bad"])]);
        assert_eq!(report.failed_rows(), 1);
        assert_eq!(report.errors.len(), 4);
        let permissive = ErrorPolicy {
            max_error_count: Some(1),
            max_error_ratio: None,
        };
        assert!(!report.exceeds(&permissive));
    }

    #[test]
    fn range_rule_applies_to_numeric_columns() {
        let columns = vec![ColumnSpec::new("pop", ColumnType::Int).with_rule(ValueRule::Range {
            min: Some(0),
            max: Some(1000),
        })];
        let validator = RowValidator::new(&columns).unwrap();
        assert!(validator.validate_row(0, &row(&["500"])).is_ok());
        assert!(validator.validate_row(0, &row(&["-1"])).is_err());
        assert!(validator.validate_row(0, &row(&["1001"])).is_err());
    }

    #[test]
    fn bad_pattern_fails_at_construction() {
        let columns =
            vec![ColumnSpec::new("zip3", ColumnType::Text).with_rule(ValueRule::Pattern("[".into()))];
        let err = RowValidator::new(&columns).expect_err("unclosed class");
        assert!(matches!(err, RuleError::BadPattern { .. }));
    }
}
