//! Key material: per-file symmetric keys and initialization vectors.

use crate::error::{CryptoError, CryptoResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of an initialization vector in bytes (96-bit GCM nonce).
pub const IV_SIZE: usize = 12;

/// A 256-bit file encryption key.
///
/// Generated once per file and never reused. The bytes are wiped when the
/// key is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generates a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Wraps key bytes received out-of-band.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyMaterial {
                material: "key",
                expected: KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// A 96-bit initialization vector.
///
/// Always drawn from the CSPRNG; never derived from a counter. `from_slice`
/// exists only for the decrypting side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generates a fresh IV from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Wraps IV bytes received out-of-band, for decryption.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; IV_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyMaterial {
                material: "iv",
                expected: IV_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }
}

/// Generates a new per-file key.
pub fn generate_key() -> SymmetricKey {
    SymmetricKey::generate()
}

/// Generates a new IV for a single encryption operation.
pub fn generate_iv() -> Iv {
    Iv::generate()
}

/// Encodes key or IV bytes for transport (standard base64).
pub fn encode_key_material(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes transport-encoded key or IV bytes.
pub fn decode_key_material(encoded: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::Encoding(e.to_string()))
}
