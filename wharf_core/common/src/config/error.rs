use crate::error::diagnostics::DiagnosticMessage;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration not found: {context}")]
    NotFound { context: DiagnosticMessage },
    #[error("duplicate configuration entry: {context}")]
    Duplicate { context: DiagnosticMessage },
    #[error("config parse error: {context}")]
    Parse {
        context: DiagnosticMessage,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("I/O error: {context}")]
    Io {
        context: DiagnosticMessage,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn duplicate(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Duplicate {
            context: DiagnosticMessage::new(format!("Entry '{name}' is defined more than once")),
        }
    }

    #[track_caller]
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: DiagnosticMessage::new(message.into()),
            source,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    #[track_caller]
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}

impl From<io::Error> for ConfigError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        ConfigError::Io {
            context: DiagnosticMessage::new(err.to_string()),
            source: err,
        }
    }
}
