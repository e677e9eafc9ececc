//! Upload orchestration: file → sealed envelope → single upload request.
//!
//! Each task advances `Queued → Encrypting → Uploading → Complete`, or ends
//! in `Failed` from `Encrypting`/`Uploading`. Tasks run concurrently and are
//! not ordered against each other. Every state change is published to
//! subscribers as an [`UploadTask`] snapshot.

use crate::api_client::{EnvelopeSender, ProgressSink};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::types::*;
use fileshare_crypto::{seal_file, RawFile};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Message recorded on tasks cancelled before upload.
pub const CANCELLED_MESSAGE: &str = "upload cancelled";

/// Limits applied by the orchestrator.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    pub max_upload_bytes: u64,
    pub completed_task_linger: Duration,
}

impl From<&ClientConfig> for UploadPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            completed_task_linger: config.completed_task_linger(),
        }
    }
}

struct TaskEntry {
    task: UploadTask,
    /// Cancel arrived while uploading; the request is not aborted.
    cancel_requested: bool,
}

type TaskMap = Arc<Mutex<HashMap<TaskId, TaskEntry>>>;

fn lock(tasks: &TaskMap) -> MutexGuard<'_, HashMap<TaskId, TaskEntry>> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives encrypted uploads and tracks their progress.
#[derive(Clone)]
pub struct UploadOrchestrator {
    sender: Arc<dyn EnvelopeSender>,
    policy: UploadPolicy,
    tasks: TaskMap,
    events: broadcast::Sender<UploadTask>,
}

impl UploadOrchestrator {
    pub fn new(sender: Arc<dyn EnvelopeSender>, policy: UploadPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sender,
            policy,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Receives a snapshot after every task state change.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadTask> {
        self.events.subscribe()
    }

    /// Accepts a file for upload and starts it immediately.
    ///
    /// Oversized files are rejected before a task is created. Must be called
    /// from within a Tokio runtime.
    pub fn submit(&self, file: RawFile) -> ClientResult<UploadTask> {
        let size = file.size();
        if size > self.policy.max_upload_bytes {
            return Err(ClientError::FileTooLarge {
                size,
                limit: self.policy.max_upload_bytes,
            });
        }

        let task = UploadTask {
            id: TaskId::new(),
            file_name: file.name.clone(),
            total_bytes: size,
            stage: UploadStage::Queued,
            bytes_transferred: 0,
            error_message: None,
        };

        {
            let mut tasks = lock(&self.tasks);
            tasks.insert(
                task.id,
                TaskEntry {
                    task: task.clone(),
                    cancel_requested: false,
                },
            );
            self.publish(&task);
        }
        debug!("queued upload {} ({}, {size} bytes)", task.id, task.file_name);

        let this = self.clone();
        let id = task.id;
        tokio::spawn(async move { this.drive(id, file).await });

        Ok(task)
    }

    /// Requests cancellation.
    ///
    /// Returns `true` if the task was stopped before any network request
    /// (it moves to `Failed`). Returns `false` if the upload is already in
    /// flight, in which case it may still complete, or if the task is
    /// already terminal.
    pub fn cancel(&self, id: TaskId) -> ClientResult<bool> {
        let mut tasks = lock(&self.tasks);
        let entry = tasks
            .get_mut(&id)
            .ok_or_else(|| ClientError::TaskNotFound(id.to_string()))?;

        if entry.task.stage.is_cancellable() {
            entry.task.stage = UploadStage::Failed;
            entry.task.error_message = Some(CANCELLED_MESSAGE.to_string());
            self.publish(&entry.task);
            info!("cancelled upload {id}");
            return Ok(true);
        }

        if entry.task.stage == UploadStage::Uploading {
            entry.cancel_requested = true;
            debug!("cancel requested for in-flight upload {id}; not aborting");
        }
        Ok(false)
    }

    /// Dismisses a finished or failed task.
    pub fn remove(&self, id: TaskId) -> ClientResult<UploadTask> {
        let mut tasks = lock(&self.tasks);
        let stage = tasks
            .get(&id)
            .map(|entry| entry.task.stage)
            .ok_or_else(|| ClientError::TaskNotFound(id.to_string()))?;
        if !stage.is_terminal() {
            return Err(ClientError::TaskActive(id.to_string()));
        }
        tasks
            .remove(&id)
            .map(|entry| entry.task)
            .ok_or_else(|| ClientError::TaskNotFound(id.to_string()))
    }

    pub fn task(&self, id: TaskId) -> Option<UploadTask> {
        lock(&self.tasks).get(&id).map(|entry| entry.task.clone())
    }

    pub fn tasks(&self) -> Vec<UploadTask> {
        lock(&self.tasks)
            .values()
            .map(|entry| entry.task.clone())
            .collect()
    }

    async fn drive(self, id: TaskId, file: RawFile) {
        if !self.advance(id, UploadStage::Queued, UploadStage::Encrypting) {
            return;
        }

        let sealed = tokio::task::spawn_blocking(move || seal_file(&file)).await;
        let envelope = match sealed {
            Ok(Ok(envelope)) => Arc::new(envelope),
            Ok(Err(e)) => {
                self.fail(id, ClientError::from(e).to_string());
                return;
            }
            Err(e) => {
                self.fail(id, format!("encryption task failed: {e}"));
                return;
            }
        };

        // Cancellation is checked under the same lock that flips the stage,
        // so a cancelled task never reaches the network.
        if !self.start_upload(id, envelope.ciphertext().len() as u64) {
            debug!("upload {id} cancelled after encryption, discarding envelope");
            return;
        }

        let progress = self.progress_sink(id);
        match self.sender.send_envelope(envelope, progress).await {
            Ok(()) => {
                self.complete(id);
                self.schedule_removal(id);
            }
            Err(e) => self.fail(id, e.to_string()),
        }
    }

    /// Moves `id` from `from` to `to`. Returns false if the task is gone or
    /// no longer in `from` (i.e. it was cancelled).
    fn advance(&self, id: TaskId, from: UploadStage, to: UploadStage) -> bool {
        self.transition(id, from, |task| task.stage = to)
    }

    /// `Encrypting → Uploading`; from here on `total_bytes` counts the bytes
    /// on the wire.
    fn start_upload(&self, id: TaskId, wire_bytes: u64) -> bool {
        self.transition(id, UploadStage::Encrypting, |task| {
            task.stage = UploadStage::Uploading;
            task.total_bytes = wire_bytes;
            task.bytes_transferred = 0;
        })
    }

    fn transition(
        &self,
        id: TaskId,
        from: UploadStage,
        apply: impl FnOnce(&mut UploadTask),
    ) -> bool {
        let mut tasks = lock(&self.tasks);
        let Some(entry) = tasks.get_mut(&id) else {
            return false;
        };
        if entry.task.stage != from {
            return false;
        }
        apply(&mut entry.task);
        self.publish(&entry.task);
        true
    }

    fn complete(&self, id: TaskId) {
        let mut tasks = lock(&self.tasks);
        if let Some(entry) = tasks.get_mut(&id) {
            if entry.task.stage != UploadStage::Uploading {
                return;
            }
            entry.task.stage = UploadStage::Complete;
            entry.task.bytes_transferred = entry.task.total_bytes;
            if entry.cancel_requested {
                info!("upload {id} completed despite cancel request");
            } else {
                info!("upload {id} complete: {}", entry.task.file_name);
            }
            self.publish(&entry.task);
        }
    }

    fn fail(&self, id: TaskId, message: String) {
        let mut tasks = lock(&self.tasks);
        if let Some(entry) = tasks.get_mut(&id) {
            if entry.task.stage.is_terminal() {
                return;
            }
            warn!("upload {id} failed: {message}");
            entry.task.stage = UploadStage::Failed;
            entry.task.error_message = Some(message);
            self.publish(&entry.task);
        }
    }

    /// Forwards transport progress to the task.
    ///
    /// Byte counts are taken verbatim; a report lower than what was already
    /// seen (an upload replayed after a token refresh) is dropped so
    /// observers see a non-decreasing count.
    fn progress_sink(&self, id: TaskId) -> ProgressSink {
        let tasks = Arc::clone(&self.tasks);
        let events = self.events.clone();
        Arc::new(move |progress: UploadProgress| {
            let mut tasks = lock(&tasks);
            let Some(entry) = tasks.get_mut(&id) else {
                return;
            };
            if entry.task.stage != UploadStage::Uploading
                || progress.bytes_transferred < entry.task.bytes_transferred
            {
                return;
            }
            entry.task.bytes_transferred = progress.bytes_transferred;
            let _ = events.send(entry.task.clone());
        })
    }

    fn schedule_removal(&self, id: TaskId) {
        let tasks = Arc::clone(&self.tasks);
        let linger = self.policy.completed_task_linger;
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            let mut tasks = lock(&tasks);
            if tasks
                .get(&id)
                .is_some_and(|entry| entry.task.stage == UploadStage::Complete)
            {
                tasks.remove(&id);
                debug!("dropped completed upload {id}");
            }
        });
    }

    fn publish(&self, task: &UploadTask) {
        // No subscribers is fine.
        let _ = self.events.send(task.clone());
    }
}
