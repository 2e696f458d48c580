use std::path::PathBuf;

/// Errors raised by a [`crate::Store`] implementation.
///
/// This is the error type the `store_failure` branch of the core's error
/// taxonomy wraps; every variant here is meant to be fatal to the calling
/// atomic operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no such path in store: {0}")]
    NotFound(String),

    #[error("path exists and is not a directory: {0}")]
    NotATree(String),

    #[error("path exists and is not a file: {0}")]
    NotABlob(String),

    #[error("cannot remove non-empty tree without recursive=true: {0}")]
    TreeNotEmpty(String),

    #[error("parent directory does not exist: {0}")]
    NoParent(String),

    #[error("malformed object id: {0}")]
    BadObjectId(String),

    #[error("corrupted object {0}: {1}")]
    Corrupt(String, String),

    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
