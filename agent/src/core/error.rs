//! Structured failures of the tool layer.
//!
//! Tools return `Result<String, ActionError>`. The error is turned into text only
//! when the dispatcher builds the [`ActionResult`](crate::core::types::ActionResult)
//! handed back to the model.

/// Coarse classification of an [`ActionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionErrorKind {
    ContainmentViolation,
    NotFound,
    NotAFile,
    NotADirectory,
    ExtensionRejected,
    Timeout,
    UnknownAction,
    InvalidArguments,
    Generic,
}

/// Errors produced by the filesystem and process tools.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Cannot {verb} \"{path}\" as it is outside the permitted working directory")]
    Containment { verb: &'static str, path: String },

    #[error("File \"{path}\" not found.")]
    NotFound { path: String },

    #[error("File not found or is not a regular file: \"{path}\"")]
    NotAFile { path: String },

    #[error("\"{path}\" is not a directory")]
    NotADirectory { path: String },

    #[error("\"{path}\" is not a .{extension} script")]
    ExtensionRejected { path: String, extension: String },

    #[error("Process timed out after {secs} seconds.")]
    Timeout { secs: u64 },

    #[error("Unknown action: {name}")]
    UnknownAction { name: String },

    #[error("Invalid arguments for {name}: {detail}")]
    InvalidArguments { name: String, detail: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Generic(String),
}

impl ActionError {
    pub fn kind(&self) -> ActionErrorKind {
        match self {
            ActionError::Containment { .. } => ActionErrorKind::ContainmentViolation,
            ActionError::NotFound { .. } => ActionErrorKind::NotFound,
            ActionError::NotAFile { .. } => ActionErrorKind::NotAFile,
            ActionError::NotADirectory { .. } => ActionErrorKind::NotADirectory,
            ActionError::ExtensionRejected { .. } => ActionErrorKind::ExtensionRejected,
            ActionError::Timeout { .. } => ActionErrorKind::Timeout,
            ActionError::UnknownAction { .. } => ActionErrorKind::UnknownAction,
            ActionError::InvalidArguments { .. } => ActionErrorKind::InvalidArguments,
            ActionError::Io { .. } | ActionError::Generic(_) => ActionErrorKind::Generic,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ActionError::Io {
            context: context.into(),
            source,
        }
    }

    /// Text shown to the model.
    pub fn render(&self) -> String {
        format!("Error: {self}")
    }
}

/// Result type for tool operations.
pub type ActionOutcome = std::result::Result<String, ActionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_prefixes_error() {
        let err = ActionError::Containment {
            verb: "read",
            path: "../secret".to_string(),
        };
        assert_eq!(err.kind(), ActionErrorKind::ContainmentViolation);
        assert_eq!(
            err.render(),
            "Error: Cannot read \"../secret\" as it is outside the permitted working directory"
        );
    }

    #[test]
    fn io_errors_are_generic() {
        let err = ActionError::io(
            "read notes.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ActionErrorKind::Generic);
        assert_eq!(err.to_string(), "read notes.txt: denied");
    }

    #[test]
    fn timeout_names_the_limit() {
        let err = ActionError::Timeout { secs: 30 };
        assert_eq!(err.render(), "Error: Process timed out after 30 seconds.");
    }
}
