//! Shared types for session and file operations.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access/refresh credential pair.
///
/// Replaced wholesale on refresh; never mutated field by field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Expiry of the access token, read from its JWT `exp` claim.
    ///
    /// Returns `None` for opaque tokens. The signature is not checked; the
    /// server stays the authority on validity.
    pub fn access_expiry(&self) -> Option<DateTime<Utc>> {
        #[derive(Deserialize)]
        struct Claims {
            exp: i64,
        }

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Claims>(
            &self.access_token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .ok()?;
        DateTime::from_timestamp(data.claims.exp, 0)
    }

    /// Returns true if the access token expires within `secs` seconds.
    /// Tokens without a readable expiry never report as expiring.
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        let Some(exp) = self.access_expiry() else {
            return false;
        };
        let deadline =
            TimeDelta::try_seconds(secs).and_then(|margin| Utc::now().checked_add_signed(margin));
        match deadline {
            Some(deadline) => deadline >= exp,
            // Past the representable range: any expiry is inside the margin.
            None => secs > 0,
        }
    }
}

/// Refresh single-flight state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    RefreshInFlight,
}

/// Account details returned by login and registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub mfa_enabled: bool,
}

/// Result of a successful login or registration.
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
}

/// Registration form.
#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

/// A stored file as listed by the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub owner_username: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Bytes returned by the download endpoint.
#[derive(Clone, Debug)]
pub struct DownloadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Opaque upload task identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Upload task stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    Queued,
    Encrypting,
    Uploading,
    Complete,
    Failed,
}

impl UploadStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStage::Complete | UploadStage::Failed)
    }

    /// Cancellation is honoured only before any bytes hit the network.
    pub fn is_cancellable(self) -> bool {
        matches!(self, UploadStage::Queued | UploadStage::Encrypting)
    }
}

/// Snapshot of an upload as seen by observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: TaskId,
    pub file_name: String,
    /// Plaintext size while `Queued`/`Encrypting`. On entering `Uploading`
    /// it becomes the ciphertext size (plaintext plus the AEAD tag), which
    /// is what the transport reports progress against.
    pub total_bytes: u64,
    pub stage: UploadStage,
    pub bytes_transferred: u64,
    pub error_message: Option<String>,
}

/// Byte progress reported by the transport while uploading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}
