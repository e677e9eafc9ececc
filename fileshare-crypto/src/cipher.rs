//! AES-256-GCM transform.
//!
//! Ciphertext layout is `ciphertext || 16-byte tag`, the same layout Web
//! Crypto produces for `AES-GCM`, so envelopes sealed here open in a browser
//! client and vice versa.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{Iv, SymmetricKey};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

/// Size of the GCM authentication tag appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Encrypts `plaintext` under `key` and `iv`.
///
/// The caller must never reuse an `iv` with the same key; use
/// [`Iv::generate`] for every call.
pub fn encrypt(key: &SymmetricKey, iv: &Iv, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .encrypt(Nonce::from_slice(iv.as_bytes()), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("AES-GCM encrypt failed: {e}")))
}

/// Decrypts and authenticates `ciphertext`.
///
/// Any modification of the ciphertext, tag, key or IV fails with
/// [`CryptoError::Integrity`]; no plaintext is returned in that case.
pub fn decrypt(key: &SymmetricKey, iv: &Iv, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Integrity(format!(
            "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
            ciphertext.len()
        )));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(iv.as_bytes()), ciphertext)
        .map_err(|_| {
            CryptoError::Integrity("authentication failed (wrong key or tampered data)".to_string())
        })
}
