use crate::config::components::connections::Connections;
use crate::types::policy::ErrorPolicy;
use serde::Deserialize;
use std::path::PathBuf;

fn default_allowed_schemas() -> Vec<String> {
    vec!["workspace".to_string(), "reference".to_string()]
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("wharf_ledger.json")
}

/// ---------------- Project Config ----------------
///
/// Top-level deployment configuration, read from `wharf.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct WharfProjectConfig {
    pub name: String,
    pub version: String,
    /// Directory of integration/transformation definition files.
    pub definitions_dir: PathBuf,
    /// Name of the warehouse connection inside the active profile.
    pub warehouse_connection: String,
    pub connection_profile: Connections,
    /// Schemas the pipeline may ever write to or read from. `config` and
    /// `customer` schemas must never appear here.
    #[serde(default = "default_allowed_schemas")]
    pub allowed_schemas: Vec<String>,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

/// File wrapper for `wharf.yml`.
#[derive(Debug, Deserialize)]
pub struct WharfProjectFile {
    pub project: WharfProjectConfig,
}
