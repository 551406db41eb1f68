use common::error::diagnostics::DiagnosticMessage;
use thiserror::Error;

/// Fatal, pre-transaction. When one of these is raised no SQL has been
/// built and no I/O has happened.
#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("invalid identifier: {context}")]
    Invalid { context: DiagnosticMessage },
    #[error("schema not whitelisted: {context}")]
    SchemaNotAllowed { context: DiagnosticMessage },
    #[error("malformed table name: {context}")]
    MalformedTableName { context: DiagnosticMessage },
}

impl IdentifierError {
    #[track_caller]
    pub fn invalid(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Invalid {
            context: DiagnosticMessage::new(format!("'{name}' is not a valid SQL identifier")),
        }
    }

    #[track_caller]
    pub fn schema_not_allowed(schema: impl Into<String>) -> Self {
        let schema = schema.into();
        Self::SchemaNotAllowed {
            context: DiagnosticMessage::new(format!(
                "schema '{schema}' is not on the allowed list"
            )),
        }
    }

    #[track_caller]
    pub fn malformed_table_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::MalformedTableName {
            context: DiagnosticMessage::new(format!("'{name}' is not a valid table reference")),
        }
    }
}
