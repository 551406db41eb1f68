use std::fmt::{Display, Formatter};
use std::panic::Location;

/// Human-readable error context tagged with the call site that produced it.
///
/// Constructors higher up the error chain are `#[track_caller]`, so the
/// recorded location points at the code that raised the error, not at this
/// module.
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    message: String,
    location: &'static Location<'static>,
}

impl DiagnosticMessage {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for DiagnosticMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}:{})",
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}
