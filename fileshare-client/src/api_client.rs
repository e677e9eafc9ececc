//! HTTP client for the fileshare REST API.
//!
//! All requests go through [`SessionTokenManager::execute`], so credential
//! attachment and refresh-on-401 apply uniformly. Also implements
//! [`EnvelopeSender`] for the upload orchestrator.

use crate::error::{ClientError, ClientResult};
use crate::session::{SessionTokenManager, LOGIN_PATH, REGISTER_PATH};
use crate::types::*;
use async_trait::async_trait;
use fileshare_crypto::EncryptedEnvelope;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const LOGOUT_PATH: &str = "/api/auth/logout/";
pub const FILES_PATH: &str = "/api/files/";

/// Receives byte progress while an envelope is being transmitted.
pub type ProgressSink = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Transmits a sealed envelope as one request.
#[async_trait]
pub trait EnvelopeSender: Send + Sync {
    /// Sends `envelope`, reporting progress through `progress`. Returns once
    /// the server has confirmed storage.
    async fn send_envelope(
        &self,
        envelope: Arc<EncryptedEnvelope>,
        progress: ProgressSink,
    ) -> ClientResult<()>;
}

#[derive(Deserialize)]
struct AuthResponse {
    user: User,
    tokens: AuthResponseTokens,
}

#[derive(Deserialize)]
struct AuthResponseTokens {
    access: String,
    refresh: String,
}

/// HTTP client for the fileshare API.
pub struct ApiClient {
    session: Arc<SessionTokenManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionTokenManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionTokenManager> {
        &self.session
    }

    // ── Auth ──

    pub async fn register(&self, req: &RegisterRequest) -> ClientResult<AuthSession> {
        let resp = self
            .session
            .execute(REGISTER_PATH, |client, url| client.post(url).json(req))
            .await?;
        self.install_session(resp).await
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        mfa_code: Option<&str>,
    ) -> ClientResult<AuthSession> {
        let mut body = serde_json::json!({ "email": email, "password": password });
        if let Some(code) = mfa_code {
            body["mfa_code"] = serde_json::Value::String(code.to_string());
        }

        let resp = self
            .session
            .execute(LOGIN_PATH, |client, url| client.post(url).json(&body))
            .await?;
        self.install_session(resp).await
    }

    /// Notifies the server (best effort) and always clears the local session.
    pub async fn logout(&self) -> ClientResult<()> {
        if self.session.is_authenticated().await {
            let result = self
                .session
                .execute(LOGOUT_PATH, |client, url| client.post(url))
                .await;
            if let Err(e) = result {
                warn!("logout request failed: {e}");
            }
        }
        self.session.clear().await
    }

    async fn install_session(&self, resp: Response) -> ClientResult<AuthSession> {
        let data: AuthResponse = check_status(resp).await?.json().await?;
        let tokens = TokenPair::new(data.tokens.access, data.tokens.refresh);
        self.session.set_tokens(tokens.clone()).await?;
        info!("authenticated as user {}", data.user.id);
        Ok(AuthSession {
            user: data.user,
            tokens,
        })
    }

    // ── Files ──

    pub async fn list_files(&self) -> ClientResult<Vec<FileRecord>> {
        let resp = self
            .session
            .execute(FILES_PATH, |client, url| client.get(url))
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    pub async fn delete_file(&self, id: Uuid) -> ClientResult<()> {
        let path = format!("{FILES_PATH}{id}/");
        let resp = self
            .session
            .execute(&path, |client, url| client.delete(url))
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    pub async fn download_file(&self, id: Uuid) -> ClientResult<DownloadedFile> {
        let path = format!("{FILES_PATH}{id}/download/");
        let resp = check_status(
            self.session
                .execute(&path, |client, url| client.get(url))
                .await?,
        )
        .await?;

        let filename = resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| "download".to_string());
        let data = resp.bytes().await?.to_vec();

        Ok(DownloadedFile { filename, data })
    }
}

#[async_trait]
impl EnvelopeSender for ApiClient {
    async fn send_envelope(
        &self,
        envelope: Arc<EncryptedEnvelope>,
        progress: ProgressSink,
    ) -> ClientResult<()> {
        let chunk_bytes = self.session.config().upload_chunk_bytes;
        let resp = self
            .session
            .execute(FILES_PATH, |client, url| {
                client
                    .post(url)
                    .multipart(envelope_form(&envelope, chunk_bytes, Arc::clone(&progress)))
            })
            .await?;
        check_status(resp).await?;

        debug!(
            "uploaded {} ({} bytes ciphertext)",
            envelope.original_name(),
            envelope.ciphertext().len()
        );
        Ok(())
    }
}

/// Builds the multipart body for one upload attempt.
///
/// The ciphertext is streamed in `chunk_bytes` pieces; each piece handed to
/// the transport emits a progress event.
fn envelope_form(envelope: &EncryptedEnvelope, chunk_bytes: usize, progress: ProgressSink) -> Form {
    let total = envelope.ciphertext().len() as u64;
    let chunks: Vec<Vec<u8>> = envelope
        .ciphertext()
        .chunks(chunk_bytes.max(1))
        .map(<[u8]>::to_vec)
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress(UploadProgress {
            bytes_transferred: sent,
            total_bytes: total,
        });
        Ok::<_, std::io::Error>(chunk)
    });

    let file_part = Part::stream_with_length(Body::wrap_stream(stream), total)
        .file_name(envelope.original_name().to_string());
    let fields = envelope.transport_fields();

    Form::new()
        .part("file", file_part)
        .text("name", envelope.original_name().to_string())
        .text("encryption_key", fields.encryption_key)
        .text("encryption_iv", fields.encryption_iv)
        .text("original_type", envelope.original_mime_type().to_string())
        .text("size", envelope.original_size().to_string())
}

/// Maps a non-2xx response to a [`ClientError`].
async fn check_status(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or(text);

    Err(match status {
        StatusCode::UNAUTHORIZED => ClientError::AuthFailed(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

/// Extracts the filename from a `Content-Disposition` header value.
fn filename_from_content_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))
        .map(|name| name.trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_quoted() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=\"report.pdf\""),
            Some("report.pdf".to_string())
        );
    }

    #[test]
    fn filename_bare() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=notes.txt"),
            Some("notes.txt".to_string())
        );
    }

    #[test]
    fn filename_missing() {
        assert_eq!(filename_from_content_disposition("inline"), None);
        assert_eq!(filename_from_content_disposition("attachment; filename=\"\""), None);
    }
}
