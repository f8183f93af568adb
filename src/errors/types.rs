use thiserror::Error;
use crate::pipeline::state::StatusKind;

/// What kind of tracked entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Run,
    Stage,
    Agent,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Stage => write!(f, "stage"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Unknown {kind}: {key}")]
    NotFound { kind: EntityKind, key: String },

    #[error("A run is already in progress: {run_id}")]
    AlreadyStarted { run_id: String },

    #[error("{kind} '{key}' already finished as {recorded}, cannot mark it {attempted}")]
    AlreadyTerminal {
        kind: EntityKind,
        key: String,
        recorded: StatusKind,
        attempted: StatusKind,
    },

    #[error("{kind} '{key}' cannot move from {from} to {to}")]
    InvalidTransition {
        kind: EntityKind,
        key: String,
        from: StatusKind,
        to: StatusKind,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StatusError {
    pub fn not_found(kind: EntityKind, key: &str) -> Self {
        Self::NotFound { kind, key: key.to_string() }
    }
}
