use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewswireError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unique constraint conflict on normalized URL: {0}")]
    UrlConflict(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
