use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhasegateError {
    #[error("not initialized: run 'phasegate init'")]
    NotInitialized,

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task already exists: {0}")]
    TaskExists(String),

    #[error("invalid transition for task {id} from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("invalid status '{0}': expected todo, in_progress, done, blocked or failed")]
    InvalidStatus(String),

    #[error("invalid priority '{0}': expected low, normal, high or critical")]
    InvalidPriority(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PhasegateError>;
