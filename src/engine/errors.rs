use std::sync::Arc;

/// Collaborator failure that can be handed to every waiter of a single-flight call.
pub type SharedError = Arc<anyhow::Error>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid zone ID: {0:?}")]
    InvalidZoneId(String),

    #[error("Invalid zone handle: element {0:?} is not attached")]
    InvalidHandle(String),

    #[error("Expected a service")]
    MissingService,

    #[error("Zone limit exceeded")]
    ZoneLimitExceeded,

    #[error("Invalid media query {query:?}: {reason}")]
    InvalidMediaQuery { query: String, reason: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] crate::engine::config::ConfigError),

    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Engine has been destroyed")]
    Destroyed,

    #[error("Collaborator error: {0}")]
    Collaborator(SharedError),
}

impl From<SharedError> for EngineError {
    fn from(err: SharedError) -> Self {
        EngineError::Collaborator(err)
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Collaborator(Arc::new(err))
    }
}
