//! Client error types.

use fileshare_crypto::CryptoError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in session, transport and upload operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("session expired, re-authentication required")]
    SessionExpired,

    #[error("authentication required")]
    AuthRequired,

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("upload task not found: {0}")]
    TaskNotFound(String),

    #[error("upload task still active: {0}")]
    TaskActive(String),

    #[error("token store error: {0}")]
    TokenStore(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Coarse classification of a [`ClientError`] for callers that only need to
/// decide how to react.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Key/IV generation or encrypt transform failed.
    EncryptionFailure,
    /// Ciphertext failed authentication.
    IntegrityError,
    /// Malformed key or IV.
    InvalidKeyMaterial,
    /// Network or HTTP-level failure.
    TransportFailure,
    /// The refresh token is no longer valid; the user must log in again.
    SessionExpired,
    /// Everything else: caller errors, API rejections, local state.
    Other,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Crypto(CryptoError::Encryption(_)) => ErrorKind::EncryptionFailure,
            ClientError::Crypto(CryptoError::Integrity(_)) => ErrorKind::IntegrityError,
            ClientError::Crypto(CryptoError::InvalidKeyMaterial { .. })
            | ClientError::Crypto(CryptoError::Encoding(_)) => ErrorKind::InvalidKeyMaterial,
            ClientError::Transport(_) | ClientError::Api { .. } => ErrorKind::TransportFailure,
            ClientError::SessionExpired => ErrorKind::SessionExpired,
            _ => ErrorKind::Other,
        }
    }
}
