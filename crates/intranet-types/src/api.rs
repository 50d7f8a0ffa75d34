use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, MessageType};

// -- JWT Claims --

/// Claims carried by the access token the auth service issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub content: String,
    pub message_type: MessageType,
}

/// Position in a channel's history, ordered the way channels sort messages:
/// by `created_at`, then by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageBound {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl PageBound {
    pub fn of(message: &Message) -> Self {
        Self {
            created_at: message.created_at,
            id: message.id,
        }
    }
}

/// Query for `GET /channels/{id}/messages`. `before` and `before_id` name the
/// oldest message already held; the server returns messages strictly before
/// it in `(created_at, id)` order, so equal timestamps are never skipped.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageQuery {
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_id: Option<Uuid>,
}

impl MessageQuery {
    pub fn new(limit: usize, before: Option<PageBound>) -> Self {
        Self {
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
            before: before.map(|b| b.created_at),
            before_id: before.map(|b| b.id),
        }
    }
}

// -- Files --

/// Response of the file storage service after a completed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub file_type: String,
    pub file_size: u64,
    /// Id of the attachment row, when the storage service created one.
    #[serde(default)]
    pub attachment_id: Option<Uuid>,
}
