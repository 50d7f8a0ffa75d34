//! Optimistic send.
//!
//! ```text
//! Composing --begin--> Sent --finish--> Reconciling --> Reconciled
//!     |                  \_____________(no files)_____/
//!     +--create fails--> Errored
//! ```
//!
//! The text-only message is persisted first and shown at once. Files upload
//! in parallel afterwards, and the persisted message is re-fetched and merged
//! once every upload has settled.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use intranet_types::models::{Attachment, Message, MessageType};

use crate::error::SendError;
use crate::services::{AuthSession, MessageService};
use crate::state::ChatState;
use crate::upload::{AttachmentUploader, LocalFile, UploadHandle, UploadKey, UploadStatus, UploadTask};

/// Contents of the compose box.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub content: String,
    files: Vec<LocalFile>,
}

impl Draft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            files: Vec::new(),
        }
    }

    /// Attach a file. A file with the same name and size is rejected.
    pub fn attach(&mut self, file: LocalFile) -> Result<(), SendError> {
        let key = file.key();
        if self.files.iter().any(|f| f.key() == key) {
            return Err(SendError::DuplicateAttachment {
                file_name: key.file_name,
                file_size: key.file_size,
            });
        }
        self.files.push(file);
        Ok(())
    }

    pub fn detach(&mut self, key: &UploadKey) -> Option<LocalFile> {
        let pos = self.files.iter().position(|f| &f.key() == key)?;
        Some(self.files.remove(pos))
    }

    pub fn files(&self) -> &[LocalFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.files.is_empty()
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::from_mime_types(self.files.iter().map(|f| f.mime_type.as_str()))
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.files.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Composing,
    Sent,
    Reconciling,
    Reconciled,
    Errored,
}

/// A message that is persisted and visible, with uploads possibly still to run.
#[derive(Debug)]
pub struct PendingSend {
    message: Message,
    uploads: Vec<UploadHandle>,
    state: SendState,
}

impl PendingSend {
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn message_id(&self) -> Uuid {
        self.message.id
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn upload_tasks(&self) -> Vec<UploadTask> {
        self.uploads.iter().map(UploadHandle::task).collect()
    }
}

/// Where the reconciled message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileSource {
    /// No files were attached.
    NotNeeded,
    /// The re-fetched message carried every uploaded file.
    Fetched,
    /// Re-fetching did not converge; built from the upload responses.
    Derived,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: Message,
    pub state: SendState,
    pub uploads: Vec<UploadTask>,
    pub source: ReconcileSource,
}

impl SendOutcome {
    pub fn failed_uploads(&self) -> impl Iterator<Item = &UploadTask> {
        self.uploads
            .iter()
            .filter(|t| matches!(t.status, UploadStatus::Error { .. }))
    }
}

#[derive(Clone)]
pub struct SendPipeline {
    service: Arc<dyn MessageService>,
    uploader: AttachmentUploader,
    auth: Arc<dyn AuthSession>,
    state: ChatState,
    reconcile_delay: Duration,
    reconcile_attempts: u32,
}

impl SendPipeline {
    pub fn new(
        service: Arc<dyn MessageService>,
        uploader: AttachmentUploader,
        auth: Arc<dyn AuthSession>,
        state: ChatState,
        reconcile_delay: Duration,
        reconcile_attempts: u32,
    ) -> Self {
        Self {
            service,
            uploader,
            auth,
            state,
            reconcile_delay,
            reconcile_attempts: reconcile_attempts.max(1),
        }
    }

    /// Persist the draft's text in the active channel and show it.
    ///
    /// On success the draft is cleared and its files move into the returned
    /// [`PendingSend`]. On error the draft is left as it was.
    pub async fn begin(&self, draft: &mut Draft) -> Result<PendingSend, SendError> {
        if draft.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let channel_id = self
            .state
            .with(|s| s.pagination.active())
            .ok_or(SendError::NoActiveChannel)?;
        if self.auth.user_id().is_none() {
            return Err(SendError::NotAuthenticated);
        }

        let message_type = draft.message_type();
        let message = self
            .service
            .create_message(channel_id, &draft.content, message_type)
            .await
            .map_err(|e| {
                warn!(channel_id = %channel_id, "Create message failed: {}", e);
                SendError::Create(e)
            })?;

        let files = std::mem::take(&mut draft.files);
        draft.clear();
        let uploads: Vec<UploadHandle> = files.into_iter().map(UploadHandle::new).collect();

        self.state.with(|s| {
            s.store.merge(message.channel_id, [message.clone()]);
            s.uploads.insert(message.id, uploads.clone());
        });

        info!(
            channel_id = %message.channel_id,
            message_id = %message.id,
            message_type = message_type.as_str(),
            files = uploads.len(),
            "Message sent"
        );

        let state = if uploads.is_empty() {
            SendState::Reconciled
        } else {
            SendState::Sent
        };
        Ok(PendingSend {
            message,
            uploads,
            state,
        })
    }

    /// Run the uploads of `pending` in parallel and reconcile the message.
    /// Upload and re-fetch failures degrade the result but never abort it.
    pub async fn finish(&self, mut pending: PendingSend) -> SendOutcome {
        if pending.uploads.is_empty() {
            return SendOutcome {
                message: pending.message,
                state: SendState::Reconciled,
                uploads: Vec::new(),
                source: ReconcileSource::NotNeeded,
            };
        }

        pending.state = SendState::Reconciling;
        let message_id = pending.message.id;

        let results = join_all(
            pending
                .uploads
                .iter()
                .map(|handle| self.uploader.upload(handle, message_id)),
        )
        .await;
        let uploaded: Vec<Attachment> = results.into_iter().filter_map(Result::ok).collect();
        debug!(
            message_id = %message_id,
            succeeded = uploaded.len(),
            total = pending.uploads.len(),
            "Uploads settled"
        );

        let (message, source) = self.reconcile(&pending.message, &uploaded).await;
        let uploads = pending.uploads.iter().map(UploadHandle::task).collect();
        self.state.with(|s| s.uploads.remove(message_id));

        SendOutcome {
            message,
            state: SendState::Reconciled,
            uploads,
            source,
        }
    }

    /// Begin and finish in one call.
    pub async fn send(&self, draft: &mut Draft) -> Result<SendOutcome, SendError> {
        let pending = self.begin(draft).await?;
        Ok(self.finish(pending).await)
    }

    async fn reconcile(&self, sent: &Message, uploaded: &[Attachment]) -> (Message, ReconcileSource) {
        let mut latest: Option<Message> = None;

        for attempt in 1..=self.reconcile_attempts {
            if !self.reconcile_delay.is_zero() {
                tokio::time::sleep(self.reconcile_delay).await;
            }
            match self.service.get_message(sent.id).await {
                Ok(fetched) if uploaded.iter().all(|a| fetched.has_attachment_url(&a.file_url)) => {
                    self.state
                        .with(|s| s.store.merge(fetched.channel_id, [fetched.clone()]));
                    debug!(message_id = %sent.id, attempt, "Reconciled from re-fetch");
                    return (fetched, ReconcileSource::Fetched);
                }
                Ok(fetched) => {
                    debug!(
                        message_id = %sent.id,
                        attempt,
                        have = fetched.attachments.len(),
                        want = uploaded.len(),
                        "Re-fetched message is missing attachments"
                    );
                    latest = Some(fetched);
                }
                Err(e) => {
                    warn!(message_id = %sent.id, attempt, "Reconciliation fetch failed: {}", e);
                }
            }
        }

        let message = self.state.with(|s| {
            let mut message = latest
                .or_else(|| s.store.get(sent.channel_id, sent.id).cloned())
                .unwrap_or_else(|| sent.clone());
            for attachment in uploaded {
                if !message.has_attachment_url(&attachment.file_url) {
                    message.attachments.push(attachment.clone());
                }
            }
            s.store.merge(message.channel_id, [message.clone()]);
            message
        });
        warn!(
            message_id = %sent.id,
            attachments = message.attachments.len(),
            "Reconciled from upload responses"
        );
        (message, ReconcileSource::Derived)
    }
}
