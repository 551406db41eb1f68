use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Semantic type a raw field is coerced into before it is bound as a SQL
/// parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Int,
    Decimal,
    Date,
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Text => "text",
            ColumnType::Int => "int",
            ColumnType::Decimal => "decimal",
            ColumnType::Date => "date",
        };
        write!(f, "{}", name)
    }
}

/// Declarative per-value check applied after type coercion. Rules are data,
/// not callbacks, so integration definitions stay loadable from config files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRule {
    /// Whole-value regex match, applied to the raw field text.
    Pattern(String),
    /// Maximum length in bytes of the raw field text.
    MaxLength(usize),
    /// Inclusive bounds for int and decimal columns.
    Range { min: Option<i64>, max: Option<i64> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub rule: Option<ValueRule>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            rule: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_rule(mut self, rule: ValueRule) -> Self {
        self.rule = Some(rule);
        self
    }
}
