use crate::types::columns::ColumnSpec;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
}

/// Deployment-time description of one importable source. Immutable at
/// runtime; the import service never mutates a definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntegrationDefinition {
    pub name: String,
    pub source_format: SourceFormat,
    pub target_schema: String,
    pub target_table: String,
    pub columns: Vec<ColumnSpec>,
    /// Upsert key. When set, the load becomes
    /// `INSERT ... ON CONFLICT (<key>) DO UPDATE` and duplicate keys within
    /// one batch are merged last-wins before the statement is built.
    #[serde(default)]
    pub unique_key: Option<Vec<String>>,
}

impl IntegrationDefinition {
    pub fn qualified_target(&self) -> String {
        format!("{}.{}", self.target_schema, self.target_table)
    }
}

/// A named truncate-and-reload recipe for one curated table.
///
/// The SQL text is trusted configuration authored by engineers, but any
/// schema it references must still pass the whitelist before execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransformationDefinition {
    pub name: String,
    pub target_schema: String,
    pub target_table: String,
    pub sql: String,
    /// Soft sanity floor for the number of rows the recipe must produce.
    #[serde(default)]
    pub expected_min_rows: Option<i64>,
}

impl TransformationDefinition {
    pub fn qualified_target(&self) -> String {
        format!("{}.{}", self.target_schema, self.target_table)
    }
}
