//! Shared helpers for client integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use fileshare_client::{
    ApiClient, ClientConfig, ClientError, ClientResult, EnvelopeSender, MemoryTokenStore,
    ProgressSink, SessionTokenManager, TaskId, TokenPair, UploadProgress, UploadTask,
};
use fileshare_crypto::EncryptedEnvelope;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use wiremock::MockServer;

pub fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        completed_task_linger_ms: 100,
        upload_chunk_bytes: 64 * 1024,
        ..ClientConfig::for_base_url(server.uri())
    }
}

/// Session manager against `server`, optionally pre-loaded with `tokens`.
pub async fn session(
    server: &MockServer,
    tokens: Option<TokenPair>,
) -> (Arc<SessionTokenManager>, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new());
    let session = Arc::new(
        SessionTokenManager::new(test_config(server), store.clone()).expect("valid config"),
    );
    if let Some(tokens) = tokens {
        session.set_tokens(tokens).await.expect("store accepts tokens");
    }
    (session, store)
}

pub async fn api(
    server: &MockServer,
    tokens: Option<TokenPair>,
) -> (ApiClient, Arc<MemoryTokenStore>) {
    let (session, store) = session(server, tokens).await;
    (ApiClient::new(session), store)
}

pub fn expired_pair() -> TokenPair {
    TokenPair::new("at-old", "rt-old")
}

/// HS256 JWT whose `exp` is `secs_from_now` seconds away.
pub fn jwt_expiring_in(secs_from_now: i64) -> String {
    let claims = serde_json::json!({
        "exp": Utc::now().timestamp() + secs_from_now,
        "user_id": 1,
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"test-signing-key"),
    )
    .expect("encode test token")
}

/// Collects snapshots for `id` until it reaches a terminal stage.
pub async fn wait_terminal(
    rx: &mut broadcast::Receiver<UploadTask>,
    id: TaskId,
) -> Vec<UploadTask> {
    let mut seen = Vec::new();
    loop {
        let task = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for upload")
            .expect("event channel closed");
        if task.id != id {
            continue;
        }
        let done = task.stage.is_terminal();
        seen.push(task);
        if done {
            return seen;
        }
    }
}

/// Sender that records envelopes and reports progress in fixed steps.
#[derive(Default)]
pub struct RecordingSender {
    pub calls: AtomicUsize,
    pub envelopes: Mutex<Vec<Arc<EncryptedEnvelope>>>,
    pub fail_with: Option<String>,
}

impl RecordingSender {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl EnvelopeSender for RecordingSender {
    async fn send_envelope(
        &self,
        envelope: Arc<EncryptedEnvelope>,
        progress: ProgressSink,
    ) -> ClientResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let total = envelope.ciphertext().len() as u64;
        let step = (total / 4).max(1);
        let mut sent = 0;
        while sent < total {
            sent = (sent + step).min(total);
            progress(UploadProgress {
                bytes_transferred: sent,
                total_bytes: total,
            });
            tokio::task::yield_now().await;
        }
        self.envelopes.lock().unwrap().push(envelope);

        match &self.fail_with {
            Some(message) => Err(ClientError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

/// Sender that blocks mid-upload until released.
#[derive(Default)]
pub struct GatedSender {
    pub started: Notify,
    pub release: Notify,
    pub calls: AtomicUsize,
}

#[async_trait]
impl EnvelopeSender for GatedSender {
    async fn send_envelope(
        &self,
        envelope: Arc<EncryptedEnvelope>,
        progress: ProgressSink,
    ) -> ClientResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let total = envelope.ciphertext().len() as u64;
        progress(UploadProgress {
            bytes_transferred: total / 2,
            total_bytes: total,
        });
        self.started.notify_one();
        self.release.notified().await;
        progress(UploadProgress {
            bytes_transferred: total,
            total_bytes: total,
        });
        Ok(())
    }
}
