//! File sealing: raw file payload <-> encrypted envelope.
//!
//! A file is encrypted as a single unit in memory. The caller is responsible
//! for enforcing a maximum accepted size before calling [`seal_file`].

use crate::cipher;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{encode_key_material, Iv, SymmetricKey};
use tracing::debug;

/// A plaintext file as selected by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Ciphertext bundled with the key material and original file metadata.
///
/// Immutable once created: all fields are private and only readable.
#[derive(Clone, Debug)]
pub struct EncryptedEnvelope {
    ciphertext: Vec<u8>,
    key: SymmetricKey,
    iv: Iv,
    original_name: String,
    original_mime_type: String,
    original_size: u64,
}

/// Base64-encoded key material as sent alongside the ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportFields {
    pub encryption_key: String,
    pub encryption_iv: String,
}

impl EncryptedEnvelope {
    /// Rebuilds an envelope from fields received over the wire.
    pub fn from_parts(
        ciphertext: Vec<u8>,
        key: &[u8],
        iv: &[u8],
        original_name: impl Into<String>,
        original_mime_type: impl Into<String>,
        original_size: u64,
    ) -> CryptoResult<Self> {
        Ok(Self {
            ciphertext,
            key: SymmetricKey::from_slice(key)?,
            iv: Iv::from_slice(iv)?,
            original_name: original_name.into(),
            original_mime_type: original_mime_type.into(),
            original_size,
        })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    pub fn iv(&self) -> &Iv {
        &self.iv
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn original_mime_type(&self) -> &str {
        &self.original_mime_type
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn transport_fields(&self) -> TransportFields {
        TransportFields {
            encryption_key: encode_key_material(self.key.as_bytes()),
            encryption_iv: encode_key_material(self.iv.as_bytes()),
        }
    }
}

/// Encrypts a file under a freshly generated key and IV.
pub fn seal_file(file: &RawFile) -> CryptoResult<EncryptedEnvelope> {
    let key = SymmetricKey::generate();
    let iv = Iv::generate();
    let ciphertext = cipher::encrypt(&key, &iv, &file.data)?;

    debug!(
        "sealed {} ({} bytes plaintext, {} bytes ciphertext)",
        file.name,
        file.data.len(),
        ciphertext.len()
    );

    Ok(EncryptedEnvelope {
        ciphertext,
        key,
        iv,
        original_name: file.name.clone(),
        original_mime_type: file.mime_type.clone(),
        original_size: file.size(),
    })
}

/// Decrypts an envelope with out-of-band key material and restores metadata.
///
/// Key and IV lengths are checked before any decryption is attempted.
pub fn open_envelope(envelope: &EncryptedEnvelope, key: &[u8], iv: &[u8]) -> CryptoResult<RawFile> {
    let key = SymmetricKey::from_slice(key)?;
    let iv = Iv::from_slice(iv)?;

    let data = cipher::decrypt(&key, &iv, &envelope.ciphertext)?;

    if data.len() as u64 != envelope.original_size {
        return Err(CryptoError::Integrity(format!(
            "size mismatch: envelope declares {} bytes, decrypted {}",
            envelope.original_size,
            data.len()
        )));
    }

    Ok(RawFile {
        name: envelope.original_name.clone(),
        mime_type: envelope.original_mime_type.clone(),
        data,
    })
}
