//! Durable storage for the session token pair.
//!
//! The session manager only needs load/save/delete; the backing store is the
//! host application's choice.

use crate::error::{ClientError, ClientResult};
use crate::types::TokenPair;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persistence for the single active [`TokenPair`].
pub trait TokenStore: Send + Sync {
    fn load(&self) -> ClientResult<Option<TokenPair>>;
    fn save(&self, tokens: &TokenPair) -> ClientResult<()>;
    fn delete(&self) -> ClientResult<()>;
}

/// Keeps the pair in memory only. Used for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `tokens`, as if persisted earlier.
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> ClientResult<Option<TokenPair>> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|e| ClientError::TokenStore(e.to_string()))?;
        Ok(tokens.clone())
    }

    fn save(&self, tokens: &TokenPair) -> ClientResult<()> {
        let mut slot = self
            .tokens
            .lock()
            .map_err(|e| ClientError::TokenStore(e.to_string()))?;
        *slot = Some(tokens.clone());
        Ok(())
    }

    fn delete(&self) -> ClientResult<()> {
        let mut slot = self
            .tokens
            .lock()
            .map_err(|e| ClientError::TokenStore(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}

/// Stores the pair as a JSON file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> ClientResult<Option<TokenPair>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClientError::TokenStore(format!(
                "reading {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn save(&self, tokens: &TokenPair) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::TokenStore(format!("creating {}: {e}", parent.display()))
            })?;
        }

        // Write-then-rename so a crash never leaves a half-written pair.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(tokens)?)
            .map_err(|e| ClientError::TokenStore(format!("writing {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            ClientError::TokenStore(format!("renaming to {}: {e}", self.path.display()))
        })
    }

    fn delete(&self) -> ClientResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::TokenStore(format!(
                "deleting {}: {e}",
                self.path.display()
            ))),
        }
    }
}
