//! Warehouse access layer: a narrow synchronous SQL surface plus the
//! Postgres adapter that implements it.
//!
//! The pipeline only ever needs `BEGIN`, `TRUNCATE`, parameterized
//! multi-row `INSERT`, `SELECT COUNT(*)` and `COMMIT`/`ROLLBACK`, so that
//! is the whole trait. Each run is one blocking transaction; there is no
//! async runtime in this path.

pub mod postgres_adapter;

pub use postgres_adapter::{connect, PostgresWarehouse};

use common::config::components::connections::{AdapterConnectionDetails, DatabaseAdapterType};
use common::error::diagnostics::DiagnosticMessage;
use common::types::SqlValue;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("invalid connection details: {context}")]
    InvalidConnection { context: DiagnosticMessage },
    #[error("statement failed: {context}")]
    Execution { context: DiagnosticMessage },
    #[error("unexpected database error: {context}")]
    Unexpected { context: DiagnosticMessage },
}

impl WarehouseError {
    #[track_caller]
    pub fn invalid_connection(message: impl Into<String>) -> Self {
        Self::InvalidConnection {
            context: DiagnosticMessage::new(redact_credentials(&message.into())),
        }
    }

    #[track_caller]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            context: DiagnosticMessage::new(redact_credentials(&message.into())),
        }
    }

    #[track_caller]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            context: DiagnosticMessage::new(redact_credentials(&message.into())),
        }
    }
}

static PASSWORD_KV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)password\s*=\s*\S+").expect("static pattern"));
static PASSWORD_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"://([^/:@\s]+):[^@\s]+@").expect("static pattern"));

/// Strip connection credentials out of driver messages before they are
/// stored on a run record or logged.
pub fn redact_credentials(message: &str) -> String {
    let message = PASSWORD_KV.replace_all(message, "password=[redacted]");
    PASSWORD_URL
        .replace_all(&message, "://$1:[redacted]@")
        .into_owned()
}

impl From<postgres::Error> for WarehouseError {
    #[track_caller]
    fn from(err: postgres::Error) -> Self {
        // The source chain can carry the connection string; keep only the
        // redacted rendering.
        WarehouseError::execution(err.to_string())
    }
}

/// Statement surface available inside one open transaction.
pub trait SqlExecutor {
    /// Run one or more statements with no parameters (TRUNCATE, advisory
    /// lock, a transformation recipe).
    fn batch_execute(&mut self, sql: &str) -> Result<(), WarehouseError>;
    /// Run a single parameterized statement, returning the affected row
    /// count. Values are always bound, never interpolated.
    fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, WarehouseError>;
    /// Run a single-row, single-column `COUNT(*)` query.
    fn query_count(&mut self, sql: &str) -> Result<i64, WarehouseError>;
}

impl<T: SqlExecutor + ?Sized> SqlExecutor for &mut T {
    fn batch_execute(&mut self, sql: &str) -> Result<(), WarehouseError> {
        (**self).batch_execute(sql)
    }

    fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, WarehouseError> {
        (**self).execute_params(sql, params)
    }

    fn query_count(&mut self, sql: &str) -> Result<i64, WarehouseError> {
        (**self).query_count(sql)
    }
}

/// An open transaction. Dropping it without [`commit`](Self::commit) rolls
/// every statement back, which is the only failure path the pipeline needs.
pub trait WarehouseTransaction: SqlExecutor {
    fn commit(self) -> Result<(), WarehouseError>;
}

/// A connection that can hand out one transaction at a time.
pub trait WarehouseClient {
    type Transaction<'a>: WarehouseTransaction
    where
        Self: 'a;

    fn transaction(&mut self) -> Result<Self::Transaction<'_>, WarehouseError>;
}

/// Open a client for the configured adapter type.
pub fn create_warehouse_client(
    details: &AdapterConnectionDetails,
) -> Result<PostgresWarehouse, WarehouseError> {
    match details.adapter_type {
        DatabaseAdapterType::Postgres => connect(details),
    }
}
