//! Client-side file encryption for fileshare.
//!
//! Files are encrypted before they leave the process:
//! - A fresh 256-bit key and 96-bit IV per file, from the OS CSPRNG
//! - AES-256-GCM, so tampering is detected on decrypt
//! - An [`EncryptedEnvelope`] carrying ciphertext, key material and the
//!   original name, MIME type and size
//!
//! # Architecture
//!
//! 1. **Key material** ([`key`]): key/IV generation and transport encoding.
//! 2. **Cipher** ([`cipher`]): the stateless AEAD transform.
//! 3. **Pipeline** ([`pipeline`]): [`seal_file`] and its exact inverse
//!    [`open_envelope`].
//!
//! There is no streaming mode; a file is sealed in one shot.

pub mod cipher;
mod error;
pub mod key;
pub mod pipeline;

pub use cipher::{decrypt, encrypt, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    decode_key_material, encode_key_material, generate_iv, generate_key, Iv, SymmetricKey,
    IV_SIZE, KEY_SIZE,
};
pub use pipeline::{open_envelope, seal_file, EncryptedEnvelope, RawFile, TransportFields};
