use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use intranet_types::models::{Attachment, is_image_mime};

use crate::error::UploadFailure;
use crate::services::{AuthSession, FileStorage};

/// A file picked for an outgoing message, held in memory until uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(name, mime_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }

    pub fn key(&self) -> UploadKey {
        UploadKey {
            file_name: self.name.clone(),
            file_size: self.size(),
        }
    }
}

/// Identity of an upload within one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadKey {
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Uploading,
    Completed { url: String },
    Error { reason: String },
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Uploading)
    }
}

/// Shared progress state of one upload, written by the storage collaborator
/// while bytes go out and read by the view.
#[derive(Debug)]
pub struct UploadProgress {
    pub bytes_done: AtomicU64,
    pub bytes_total: AtomicU64,
    status: Mutex<UploadStatus>,
}

impl UploadProgress {
    pub fn new(bytes_total: u64) -> Self {
        Self {
            bytes_done: AtomicU64::new(0),
            bytes_total: AtomicU64::new(bytes_total),
            status: Mutex::new(UploadStatus::Uploading),
        }
    }

    pub fn advance(&self, bytes: u64) {
        self.bytes_done.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Progress in percent, 0..=100.
    pub fn percent(&self) -> u8 {
        if matches!(self.status(), UploadStatus::Completed { .. }) {
            return 100;
        }
        let total = self.bytes_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }
        let done = self.bytes_done.load(Ordering::Relaxed).min(total);
        (done * 100 / total) as u8
    }

    pub fn status(&self) -> UploadStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn complete(&self, url: impl Into<String>) {
        self.finish(UploadStatus::Completed { url: url.into() });
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.finish(UploadStatus::Error {
            reason: reason.into(),
        });
    }

    // Only the first terminal state sticks.
    fn finish(&self, next: UploadStatus) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if !status.is_terminal() {
            *status = next;
        }
    }
}

/// Snapshot of an upload for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub key: UploadKey,
    pub progress: u8,
    pub status: UploadStatus,
}

/// A file paired with its progress state.
#[derive(Debug, Clone)]
pub struct UploadHandle {
    pub file: LocalFile,
    pub progress: Arc<UploadProgress>,
}

impl UploadHandle {
    pub fn new(file: LocalFile) -> Self {
        let progress = Arc::new(UploadProgress::new(file.size()));
        Self { file, progress }
    }

    pub fn task(&self) -> UploadTask {
        UploadTask {
            key: self.file.key(),
            progress: self.progress.percent(),
            status: self.progress.status(),
        }
    }
}

/// Uploads still attached to a message that has not been reconciled.
#[derive(Debug, Default)]
pub struct UploadBoard {
    by_message: HashMap<Uuid, Vec<UploadHandle>>,
}

impl UploadBoard {
    pub fn insert(&mut self, message_id: Uuid, handles: Vec<UploadHandle>) {
        if !handles.is_empty() {
            self.by_message.insert(message_id, handles);
        }
    }

    pub fn remove(&mut self, message_id: Uuid) -> Option<Vec<UploadHandle>> {
        self.by_message.remove(&message_id)
    }

    pub fn tasks(&self, message_id: Uuid) -> Vec<UploadTask> {
        self.by_message
            .get(&message_id)
            .map(|handles| handles.iter().map(UploadHandle::task).collect())
            .unwrap_or_default()
    }

    pub fn pending_messages(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.by_message.keys().copied()
    }
}

/// Uploads one file for one message and reports the resulting attachment.
#[derive(Clone)]
pub struct AttachmentUploader {
    storage: Arc<dyn FileStorage>,
    auth: Arc<dyn AuthSession>,
    max_file_size: u64,
}

impl AttachmentUploader {
    pub fn new(storage: Arc<dyn FileStorage>, auth: Arc<dyn AuthSession>, max_file_size: u64) -> Self {
        Self {
            storage,
            auth,
            max_file_size,
        }
    }

    /// Upload `handle.file` for `message_id`. The terminal status is written
    /// to `handle.progress` either way; failures are not retried.
    pub async fn upload(
        &self,
        handle: &UploadHandle,
        message_id: Uuid,
    ) -> Result<Attachment, UploadFailure> {
        let result = self.try_upload(handle, message_id).await;
        match &result {
            Ok(attachment) => {
                handle.progress.complete(attachment.file_url.clone());
                debug!(
                    message_id = %message_id,
                    file_name = %handle.file.name,
                    url = %attachment.file_url,
                    "Upload complete"
                );
            }
            Err(e) => {
                handle.progress.fail(e.to_string());
                warn!(
                    message_id = %message_id,
                    file_name = %handle.file.name,
                    "Upload failed: {}",
                    e
                );
            }
        }
        result
    }

    async fn try_upload(
        &self,
        handle: &UploadHandle,
        message_id: Uuid,
    ) -> Result<Attachment, UploadFailure> {
        let file = &handle.file;
        if file.size() > self.max_file_size {
            return Err(UploadFailure::TooLarge {
                size: file.size(),
                limit: self.max_file_size,
            });
        }
        let token = self
            .auth
            .access_token()
            .ok_or(UploadFailure::NotAuthenticated)?;

        let stored = self
            .storage
            .upload_file(file, message_id, &token, handle.progress.clone())
            .await?;

        let file_type = if stored.file_type.is_empty() {
            file.mime_type.clone()
        } else {
            stored.file_type
        };
        let thumbnail_url = if is_image_mime(&file_type) {
            stored.thumbnail_url
        } else {
            None
        };

        Ok(Attachment {
            id: stored.attachment_id.unwrap_or_else(Uuid::new_v4),
            message_id,
            file_name: file.name.clone(),
            file_type,
            file_size: stored.file_size,
            file_url: stored.url,
            thumbnail_url,
        })
    }
}
