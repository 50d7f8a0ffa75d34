use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Public,
    Private,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Kind of a message, derived from its attachments at send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
}

impl MessageType {
    /// `File` if any attachment is not an image, `Image` if there are
    /// attachments and all of them are images, `Text` otherwise.
    pub fn from_mime_types<'a, I>(mime_types: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut any = false;
        for mime in mime_types {
            if !is_image_mime(mime) {
                return Self::File;
            }
            any = true;
        }
        if any { Self::Image } else { Self::Text }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

/// A message as persisted by the backend.
///
/// `content` and `message_type` are fixed when the message is created. Only
/// `attachments`, `reactions` and `is_deleted` change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reactions: Vec<ReactionGroup>,
}

impl Message {
    /// Content as it should be rendered. Soft-deleted messages render empty.
    pub fn display_content(&self) -> &str {
        if self.is_deleted { "" } else { &self.content }
    }

    pub fn has_attachment_url(&self, url: &str) -> bool {
        self.attachments.iter().any(|a| a.file_url == url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub file_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        is_image_mime(&self.file_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}
