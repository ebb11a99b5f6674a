//! Error types for token storage

/// Errors from opening or persisting a token store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token file parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for token storage operations.
pub type Result<T> = std::result::Result<T, Error>;
