use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, ReactionGroup};

/// Events pushed by the realtime gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PushEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A message was posted
    MessageCreate { message: Message },

    /// A message changed (attachments associated, edited reactions, ...)
    MessageUpdate { message: Message },

    /// A message was soft-deleted
    MessageDelete { channel_id: Uuid, message_id: Uuid },

    /// The reaction set of a message changed
    ReactionsUpdate {
        channel_id: Uuid,
        message_id: Uuid,
        reactions: Vec<ReactionGroup>,
    },
}

impl PushEvent {
    /// Returns the channel_id if this event is scoped to a specific channel.
    pub fn channel_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { message } | Self::MessageUpdate { message } => {
                Some(message.channel_id)
            }
            Self::MessageDelete { channel_id, .. } => Some(*channel_id),
            Self::ReactionsUpdate { channel_id, .. } => Some(*channel_id),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Subscribe to events for specific channels.
    /// The server only forwards channel-scoped events for subscribed channels.
    Subscribe { channel_ids: Vec<Uuid> },
}
