use uuid::Uuid;

use intranet_chat::{ChatSnapshot, SendOutcome, UploadStatus};
use intranet_types::models::Message;

pub fn message_line(message: &Message, me: Option<Uuid>) -> String {
    let author = if Some(message.user_id) == me {
        "you".to_string()
    } else {
        message.user_id.simple().to_string()[..8].to_string()
    };
    let mut line = format!(
        "[{}] {}: {}",
        message.created_at.format("%H:%M"),
        author,
        if message.is_deleted {
            "(deleted)"
        } else {
            message.display_content()
        }
    );
    for attachment in &message.attachments {
        line.push_str(&format!(
            "\n        + {} ({} bytes) {}",
            attachment.file_name, attachment.file_size, attachment.file_url
        ));
    }
    for reaction in &message.reactions {
        line.push_str(&format!(" {}x{}", reaction.emoji, reaction.count));
    }
    line
}

pub fn channel_list(snapshot: &ChatSnapshot) -> String {
    if snapshot.channels.is_empty() {
        return "(no channels)".into();
    }
    snapshot
        .channels
        .iter()
        .map(|entry| {
            let marker = if entry.active { '*' } else { ' ' };
            let unread = if entry.unread > 0 {
                format!(" ({} unread)", entry.unread)
            } else {
                String::new()
            };
            format!("{marker} #{}{unread}", entry.channel.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn send_summary(outcome: &SendOutcome) -> String {
    let mut lines = vec![format!(
        "sent with {} attachment(s)",
        outcome.message.attachments.len()
    )];
    for task in &outcome.uploads {
        if let UploadStatus::Error { reason } = &task.status {
            lines.push(format!("  ! {} failed: {}", task.key.file_name, reason));
        }
    }
    lines.join("\n")
}
