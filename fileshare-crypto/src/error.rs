//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening file payloads.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key/IV generation or the encrypt transform failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext or envelope metadata failed authentication.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A key or IV of the wrong length was supplied.
    #[error("invalid {material} length: expected {expected} bytes, got {actual}")]
    InvalidKeyMaterial {
        material: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Transport-encoded key material could not be decoded.
    #[error("invalid key material encoding: {0}")]
    Encoding(String),
}
