use common::error::diagnostics::DiagnosticMessage;
use ledger::LedgerError;
use sqlident::IdentifierError;
use thiserror::Error;
use warehouse::WarehouseError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fatal, pre-transaction: no SQL was built, no I/O happened.
    #[error("identifier rejected: {0}")]
    Identifier(#[from] IdentifierError),
    /// Too many rows failed validation; the run stops before any write.
    #[error("validation threshold exceeded: {context}")]
    ValidationThreshold { context: DiagnosticMessage },
    /// Fatal, post-write: the transformation produced fewer rows than its
    /// declared floor. The transaction has been rolled back.
    #[error("row count mismatch: {context}")]
    RowCountMismatch { context: DiagnosticMessage },
    /// Fatal, mid-transaction: rolled back in full, reason redacted of
    /// credentials by the warehouse layer.
    #[error("database failure: {0}")]
    Database(#[from] WarehouseError),
    #[error("ledger failure: {0}")]
    Ledger(#[from] LedgerError),
    #[error("configuration error: {context}")]
    Config { context: DiagnosticMessage },
}

impl PipelineError {
    #[track_caller]
    pub fn threshold(failed_rows: usize, rows_scanned: usize) -> Self {
        Self::ValidationThreshold {
            context: DiagnosticMessage::new(format!(
                "{failed_rows} of {rows_scanned} rows failed validation"
            )),
        }
    }

    #[track_caller]
    pub fn row_count_mismatch(target: &str, expected_min: i64, actual: i64) -> Self {
        Self::RowCountMismatch {
            context: DiagnosticMessage::new(format!(
                "{target} holds {actual} rows, expected at least {expected_min}"
            )),
        }
    }

    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            context: DiagnosticMessage::new(message.into()),
        }
    }
}
