use super::types::StatusError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    /// The reporting collaborator sent something the declared topology or
    /// state machine does not allow.
    pub caller_bug: bool,
}

impl StatusError {
    /// Classify this error for structured logging.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            StatusError::NotFound { .. } => ErrorClassification {
                error_type: "NotFound",
                caller_bug: true,
            },
            StatusError::AlreadyStarted { .. } => ErrorClassification {
                error_type: "AlreadyStarted",
                caller_bug: true,
            },
            StatusError::AlreadyTerminal { .. } => ErrorClassification {
                error_type: "AlreadyTerminal",
                caller_bug: true,
            },
            StatusError::InvalidTransition { .. } => ErrorClassification {
                error_type: "InvalidTransition",
                caller_bug: true,
            },
            StatusError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                caller_bug: true,
            },

            StatusError::Io(_) => ErrorClassification {
                error_type: "IoError",
                caller_bug: false,
            },
            StatusError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                caller_bug: false,
            },
            StatusError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                caller_bug: false,
            },
        }
    }
}
