use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt::{Display, Formatter};

/// A coerced field value, ready to be bound as a SQL statement parameter.
///
/// Values are always passed to the driver as bound parameters. Only
/// identifiers go through string interpolation, and those only via the
/// `sqlident` constructors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SqlValue {
    Null,
    Text(String),
    Int(i64),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl Display for SqlValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Date(v) => write!(f, "{}", v),
        }
    }
}
