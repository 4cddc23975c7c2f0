use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanopyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<neo4rs::Error> for CanopyError {
    fn from(e: neo4rs::Error) -> Self {
        CanopyError::Database(e.to_string())
    }
}
