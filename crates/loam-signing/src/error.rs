/// Errors raised by the signing capability.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("no such peer key: {0}")]
    NoSuchKey(String),

    #[error("key {0} already exists")]
    KeyExists(String),

    #[error("malformed signature")]
    BadSignature,

    #[error("malformed public key")]
    BadPublicKey,

    #[error("key store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key store is corrupt: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, SigningError>;
