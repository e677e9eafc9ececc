//! Client configuration.

use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest file accepted for upload by default (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Upper bound on `token_refresh_margin_secs` (one day).
pub const MAX_TOKEN_REFRESH_MARGIN_SECS: i64 = 24 * 60 * 60;

/// Configuration for the fileshare client core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the fileshare API (e.g., "http://localhost:8000").
    pub api_base_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Refresh the access token this many seconds before its `exp` claim.
    pub token_refresh_margin_secs: i64,

    /// Files larger than this are rejected before encryption.
    pub max_upload_bytes: u64,

    /// How long a completed upload stays visible before it is dropped.
    pub completed_task_linger_ms: u64,

    /// Granularity of upload progress events.
    pub upload_chunk_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            token_refresh_margin_secs: 30,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            completed_task_linger_ms: 3_000,
            upload_chunk_bytes: 64 * 1024,
        }
    }
}

impl ClientConfig {
    /// Creates a config pointing at a local test server.
    pub fn for_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(ClientError::Config("api_base_url is empty".to_string()));
        }
        if self.upload_chunk_bytes == 0 {
            return Err(ClientError::Config("upload_chunk_bytes must be non-zero".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::Config("request_timeout_secs must be non-zero".to_string()));
        }
        if !(0..=MAX_TOKEN_REFRESH_MARGIN_SECS).contains(&self.token_refresh_margin_secs) {
            return Err(ClientError::Config(format!(
                "token_refresh_margin_secs must be between 0 and {MAX_TOKEN_REFRESH_MARGIN_SECS}"
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn completed_task_linger(&self) -> Duration {
        Duration::from_millis(self.completed_task_linger_ms)
    }

    /// Joins `path` onto the base URL without doubling slashes.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}
