//! Narrow interfaces to the collaborators the core consumes.
//!
//! The core never assumes a transport. `intranet-http` provides REST and
//! WebSocket implementations; tests use in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use intranet_types::api::{PageBound, StoredFile};
use intranet_types::models::{Channel, Message, MessageType};

use crate::error::ServiceError;
use crate::upload::{LocalFile, UploadProgress};

/// Persistence side of the backend.
#[async_trait]
pub trait MessageService: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<Channel>, ServiceError>;

    /// One page of a channel's history, at most `limit` messages ordered
    /// strictly before `before` by `(created_at, id)` (or the newest ones when
    /// `before` is `None`). Either order is accepted; callers normalize to
    /// ascending.
    async fn list_messages(
        &self,
        channel_id: Uuid,
        before: Option<PageBound>,
        limit: usize,
    ) -> Result<Vec<Message>, ServiceError>;

    /// Persist a text-only message. The returned id is final.
    async fn create_message(
        &self,
        channel_id: Uuid,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message, ServiceError>;

    async fn get_message(&self, message_id: Uuid) -> Result<Message, ServiceError>;

    async fn mark_read(&self, channel_id: Uuid) -> Result<(), ServiceError>;
}

/// File storage side of the backend. An upload for `message_id` also
/// associates the stored file with that message server-side.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn upload_file(
        &self,
        file: &LocalFile,
        message_id: Uuid,
        access_token: &str,
        progress: Arc<UploadProgress>,
    ) -> Result<StoredFile, ServiceError>;
}

/// Current session as supplied by the auth collaborator.
pub trait AuthSession: Send + Sync {
    fn user_id(&self) -> Option<Uuid>;
    fn access_token(&self) -> Option<String>;
}
