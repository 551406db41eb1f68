use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;
use validation::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Integration,
    Transformation,
}

impl Display for RunKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RunKind::Integration => write!(f, "integration"),
            RunKind::Transformation => write!(f, "transformation"),
        }
    }
}

/// One-way state machine: `Pending -> Running -> {Succeeded | Failed}`.
/// There is no retry state; a failed run is re-invoked as a brand-new run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Ledger entry for one import or transformation execution. Append-only
/// once terminal: the ledger rejects any further transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub definition: String,
    pub kind: RunKind,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub rows_processed: Option<i64>,
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    pub failure_reason: Option<String>,
}

impl RunRecord {
    pub fn open(kind: RunKind, definition: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition: definition.into(),
            kind,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            rows_processed: None,
            errors: Vec::new(),
            failure_reason: None,
        }
    }
}

/// What a caller gets back from `run_import`/`run_transformation`.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub rows_processed: i64,
    pub errors: Vec<ValidationError>,
}
