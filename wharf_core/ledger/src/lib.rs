//! Append-only record of import and transformation executions.
//!
//! The ledger is observability, not a lock: it never serializes runs (the
//! advisory lock inside each run's transaction does that) and no record is
//! edited once it reaches a terminal status.

pub mod error;
pub mod models;

pub use error::LedgerError;
pub use models::{RunKind, RunRecord, RunResult, RunStatus};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validation::ValidationError;

/// internal flat state (easy to serde)
#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct State {
    runs: HashMap<Uuid, RunRecord>,
    order: Vec<Uuid>,
}

#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<RwLock<State>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /* ---------- optional durability ---------- */
    pub fn load_from(path: &str) -> Result<Self, LedgerError> {
        let json = std::fs::read_to_string(path).unwrap_or_else(|_| "{}".into());
        let state: State = serde_json::from_str(&json)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(state)),
        })
    }

    pub fn flush_to(&self, path: &str) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(&*self.inner.read())?;
        let tmp = format!("{path}.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    /// Record the start of a run. The record enters as `Pending`.
    pub fn open(&self, kind: RunKind, definition: &str) -> Uuid {
        let record = RunRecord::open(kind, definition);
        let id = record.id;
        let mut g = self.inner.write();
        g.runs.insert(id, record);
        g.order.push(id);
        log::info!("run {id} opened for {kind} '{definition}'");
        id
    }

    pub fn mark_running(&self, id: Uuid) -> Result<(), LedgerError> {
        self.transition(id, RunStatus::Running, |record| {
            record.status = RunStatus::Running;
        })
    }

    /// Terminal success. `rows_processed` was measured inside the same
    /// transaction that loaded the table.
    pub fn complete(
        &self,
        id: Uuid,
        rows_processed: i64,
        errors: Vec<ValidationError>,
    ) -> Result<(), LedgerError> {
        self.transition(id, RunStatus::Succeeded, |record| {
            record.status = RunStatus::Succeeded;
            record.finished_at = Some(chrono::Utc::now());
            record.rows_processed = Some(rows_processed);
            record.errors = errors;
        })
    }

    /// Terminal failure, with the reason and any validation errors
    /// gathered before the run stopped.
    pub fn fail(
        &self,
        id: Uuid,
        reason: impl Into<String>,
        errors: Vec<ValidationError>,
    ) -> Result<(), LedgerError> {
        let reason = reason.into();
        self.transition(id, RunStatus::Failed, move |record| {
            record.status = RunStatus::Failed;
            record.finished_at = Some(chrono::Utc::now());
            record.failure_reason = Some(reason);
            record.errors = errors;
        })
    }

    pub fn get(&self, id: Uuid) -> Result<RunRecord, LedgerError> {
        self.inner
            .read()
            .runs
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(id.to_string()))
    }

    /// Most recent runs first.
    pub fn list(&self, limit: Option<usize>) -> Vec<RunRecord> {
        let g = self.inner.read();
        let iter = g.order.iter().rev().filter_map(|id| g.runs.get(id)).cloned();
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    fn transition(
        &self,
        id: Uuid,
        target: RunStatus,
        apply: impl FnOnce(&mut RunRecord),
    ) -> Result<(), LedgerError> {
        let mut g = self.inner.write();
        let record = g
            .runs
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(id.to_string()))?;

        let legal = match (record.status, target) {
            (RunStatus::Pending, RunStatus::Running) => true,
            (RunStatus::Running, RunStatus::Succeeded | RunStatus::Failed) => true,
            _ => false,
        };
        if !legal {
            return Err(LedgerError::illegal_transition(format!(
                "run {id} is {} and cannot become {target}",
                record.status
            )));
        }
        apply(record);
        Ok(())
    }
}
