use common::error::diagnostics::DiagnosticMessage;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("run not found: {context}")]
    NotFound { context: DiagnosticMessage },
    #[error("illegal run transition: {context}")]
    IllegalTransition { context: DiagnosticMessage },
    #[error("serde json error: {context}")]
    SerdeJson {
        context: DiagnosticMessage,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: io::Error,
    },
}

impl LedgerError {
    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn illegal_transition(message: impl Into<String>) -> Self {
        Self::IllegalTransition {
            context: DiagnosticMessage::new(message.into()),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        LedgerError::SerdeJson {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}

impl From<io::Error> for LedgerError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        LedgerError::Io {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}
