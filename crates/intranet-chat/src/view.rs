use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use intranet_types::api::PageBound;
use intranet_types::events::PushEvent;
use intranet_types::models::{Channel, Message};

use crate::config::ChatConfig;
use crate::error::{SendError, ServiceError};
use crate::pagination::{Cursor, LoadOutcome, PageKind, PaginationEngine};
use crate::send::{Draft, PendingSend, SendOutcome, SendPipeline};
use crate::services::{AuthSession, FileStorage, MessageService};
use crate::state::ChatState;
use crate::upload::{AttachmentUploader, UploadTask};
use crate::viewport::{AppendSource, ScrollCommand, ScrollMetrics};

/// What the renderer has to do after an input was handled.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUpdate {
    pub scroll: ScrollCommand,
    pub marked_read: bool,
    pub load: Option<LoadOutcome>,
}

impl ViewUpdate {
    fn stay() -> Self {
        Self {
            scroll: ScrollCommand::Stay,
            marked_read: false,
            load: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEntry {
    pub channel: Channel,
    pub unread: usize,
    pub active: bool,
}

/// Everything needed to draw the chat screen.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub channels: Vec<ChannelEntry>,
    pub active_channel: Option<Uuid>,
    pub messages: Vec<Message>,
    pub cursor: Cursor,
    /// Uploads of not yet reconciled messages in the active channel.
    pub uploads: HashMap<Uuid, Vec<UploadTask>>,
}

/// Composition root of the chat screen.
///
/// Owns one session's [`ChatState`] and routes UI input, page responses,
/// sends and push events through the store, the pagination engine, the
/// viewport controller and the read tracker.
pub struct ChatView {
    state: ChatState,
    service: Arc<dyn MessageService>,
    auth: Arc<dyn AuthSession>,
    pagination: PaginationEngine,
    sender: SendPipeline,
}

impl ChatView {
    pub fn new(
        config: ChatConfig,
        service: Arc<dyn MessageService>,
        storage: Arc<dyn FileStorage>,
        auth: Arc<dyn AuthSession>,
    ) -> Self {
        let state = ChatState::new(&config);
        let pagination = PaginationEngine::new(service.clone(), state.clone());
        let uploader = AttachmentUploader::new(storage, auth.clone(), config.max_file_size);
        let sender = SendPipeline::new(
            service.clone(),
            uploader,
            auth.clone(),
            state.clone(),
            config.reconcile_delay,
            config.reconcile_attempts,
        );
        Self {
            state,
            service,
            auth,
            pagination,
            sender,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn active_channel(&self) -> Option<Uuid> {
        self.state.with(|s| s.pagination.active())
    }

    pub fn cursor(&self, channel_id: Uuid) -> Cursor {
        self.state.with(|s| s.pagination.cursor(channel_id))
    }

    pub async fn refresh_channels(&self) -> Result<usize, ServiceError> {
        let channels = self.service.list_channels().await?;
        let count = channels.len();
        self.state.with(|s| s.channels = channels);
        debug!(count, "Channel list refreshed");
        Ok(count)
    }

    /// Look a channel up by id or by name (case-insensitive, leading `#` ignored).
    pub fn find_channel(&self, name_or_id: &str) -> Option<Channel> {
        let wanted = name_or_id.trim().trim_start_matches('#');
        let id = wanted.parse::<Uuid>().ok();
        self.state.with(|s| {
            s.channels
                .iter()
                .find(|c| Some(c.id) == id || c.name.eq_ignore_ascii_case(wanted))
                .cloned()
        })
    }

    /// Switch to `channel_id` and load its latest page.
    pub async fn select_channel(&self, channel_id: Uuid) -> ViewUpdate {
        let previous = self.state.with(|s| {
            s.viewport.channel_switched();
            s.reads.activate(channel_id);
            s.pagination.activate(channel_id)
        });
        info!(channel_id = %channel_id, previous = ?previous, "Channel selected");

        let outcome = match self.pagination.load_messages(channel_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(channel_id = %channel_id, "Initial load failed: {}", e);
                return ViewUpdate::stay();
            }
        };
        if !matches!(outcome, LoadOutcome::Loaded { .. }) {
            return ViewUpdate {
                load: Some(outcome),
                ..ViewUpdate::stay()
            };
        }

        let (scroll, mark) = self.state.with(|s| {
            (
                s.viewport.initial_load_completed(),
                s.reads.take_activation_mark(channel_id),
            )
        });
        if mark {
            self.mark_read(channel_id).await;
        }
        ViewUpdate {
            scroll,
            marked_read: mark,
            load: Some(outcome),
        }
    }

    /// The view is going away. In-flight responses stop affecting state.
    pub fn close(&self) {
        self.state.with(|s| {
            s.pagination.deactivate();
            s.reads.deactivate();
            s.viewport.channel_switched();
        });
    }

    /// The renderer finished the initial scroll-to-bottom.
    pub fn viewport_settled(&self) {
        self.state.with(|s| s.viewport.mark_settled());
    }

    /// Offset that keeps the anchor of the last prepended page in place.
    pub fn anchored_offset(&self, content_height: f32) -> Option<f32> {
        self.state.with(|s| s.viewport.anchored_offset(content_height))
    }

    /// Report a scroll position; may mark read or request an older page.
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> ViewUpdate {
        let decided = self.state.with(|s| {
            let channel_id = s.pagination.active()?;
            let cursor = s.pagination.cursor(channel_id);
            let wants_older = s.viewport.on_scroll(metrics, cursor);
            let reached_bottom = s.viewport.is_at_bottom() && s.reads.reached_bottom(channel_id);
            Some((channel_id, wants_older, reached_bottom))
        });
        let Some((channel_id, wants_older, reached_bottom)) = decided else {
            return ViewUpdate::stay();
        };

        if reached_bottom {
            self.mark_read(channel_id).await;
        }
        let mut update = if wants_older {
            self.load_older_in(channel_id).await
        } else {
            ViewUpdate::stay()
        };
        update.marked_read |= reached_bottom;
        update
    }

    /// Request the page before the oldest loaded message of the active channel.
    pub async fn load_older(&self) -> ViewUpdate {
        match self.active_channel() {
            Some(channel_id) => self.load_older_in(channel_id).await,
            None => ViewUpdate::stay(),
        }
    }

    async fn load_older_in(&self, channel_id: Uuid) -> ViewUpdate {
        match self.pagination.load_older_messages(channel_id).await {
            Ok(
                outcome @ LoadOutcome::Loaded {
                    kind: PageKind::Older,
                    inserted,
                    anchor,
                    ..
                },
            ) => {
                let scroll = if inserted > 0 {
                    self.state.with(|s| s.viewport.older_page_prepended(anchor))
                } else {
                    ScrollCommand::Stay
                };
                ViewUpdate {
                    scroll,
                    marked_read: false,
                    load: Some(outcome),
                }
            }
            Ok(outcome) => ViewUpdate {
                load: Some(outcome),
                ..ViewUpdate::stay()
            },
            Err(e) => {
                warn!(channel_id = %channel_id, "Older page failed: {}", e);
                ViewUpdate::stay()
            }
        }
    }

    /// Persist and show the draft. Uploads start with [`ChatView::finish_send`].
    pub async fn begin_send(&self, draft: &mut Draft) -> Result<(PendingSend, ViewUpdate), SendError> {
        let pending = self.sender.begin(draft).await?;
        let channel_id = pending.message().channel_id;
        let scroll = self.state.with(|s| {
            if s.pagination.active() == Some(channel_id) {
                s.viewport.messages_appended(AppendSource::OwnSend)
            } else {
                ScrollCommand::Stay
            }
        });
        Ok((
            pending,
            ViewUpdate {
                scroll,
                ..ViewUpdate::stay()
            },
        ))
    }

    /// Upload the files of `pending` and reconcile the message.
    pub async fn finish_send(&self, pending: PendingSend) -> (SendOutcome, ViewUpdate) {
        let outcome = self.sender.finish(pending).await;
        let channel_id = outcome.message.channel_id;
        let scroll = if outcome.uploads.is_empty() {
            ScrollCommand::Stay
        } else {
            self.state.with(|s| {
                if s.pagination.active() == Some(channel_id) {
                    s.viewport.messages_appended(AppendSource::Reconcile)
                } else {
                    ScrollCommand::Stay
                }
            })
        };
        (
            outcome,
            ViewUpdate {
                scroll,
                ..ViewUpdate::stay()
            },
        )
    }

    pub async fn send(&self, draft: &mut Draft) -> Result<SendOutcome, SendError> {
        let (pending, _) = self.begin_send(draft).await?;
        let (outcome, _) = self.finish_send(pending).await;
        Ok(outcome)
    }

    /// Apply a realtime event. Delivery may repeat; merging by id absorbs it.
    pub async fn apply_push(&self, event: PushEvent) -> ViewUpdate {
        match event {
            PushEvent::Ready { user_id, username } => {
                debug!(user_id = %user_id, %username, "Push gateway ready");
                ViewUpdate::stay()
            }
            PushEvent::MessageCreate { message } => self.merge_pushed(message, true).await,
            PushEvent::MessageUpdate { message } => self.merge_pushed(message, false).await,
            PushEvent::MessageDelete {
                channel_id,
                message_id,
            } => {
                let found = self
                    .state
                    .with(|s| s.store.update(channel_id, message_id, |m| m.is_deleted = true));
                debug!(channel_id = %channel_id, message_id = %message_id, found, "Message deleted");
                ViewUpdate::stay()
            }
            PushEvent::ReactionsUpdate {
                channel_id,
                message_id,
                reactions,
            } => {
                self.state
                    .with(|s| s.store.update(channel_id, message_id, |m| m.reactions = reactions));
                ViewUpdate::stay()
            }
        }
    }

    /// Only creations count as unread. A message that is unknown and older
    /// than the loaded window is left for paging to deliver.
    async fn merge_pushed(&self, message: Message, created: bool) -> ViewUpdate {
        let me = self.auth.user_id();
        let channel_id = message.channel_id;
        let counts = created && me != Some(message.user_id);

        let (scroll, mark) = self.state.with(|s| {
            if s.store.get(channel_id, message.id).is_none()
                && s.pagination.is_below_window(channel_id, PageBound::of(&message))
            {
                debug!(channel_id = %channel_id, message_id = %message.id, "Ignoring push below loaded window");
                return (ScrollCommand::Stay, false);
            }
            let merged = s.store.merge(channel_id, [message]);
            if merged.inserted == 0 {
                return (ScrollCommand::Stay, false);
            }
            let active = s.pagination.active() == Some(channel_id);
            let scroll = if active && merged.appended > 0 {
                s.viewport.messages_appended(AppendSource::Push)
            } else {
                ScrollCommand::Stay
            };
            let from_others = if counts { merged.inserted } else { 0 };
            let at_bottom = active && s.viewport.is_at_bottom();
            (scroll, s.reads.messages_arrived(channel_id, from_others, at_bottom))
        });

        if mark {
            self.mark_read(channel_id).await;
        }
        ViewUpdate {
            scroll,
            marked_read: mark,
            load: None,
        }
    }

    async fn mark_read(&self, channel_id: Uuid) {
        match self.service.mark_read(channel_id).await {
            Ok(()) => debug!(channel_id = %channel_id, "Marked read"),
            Err(e) => warn!(channel_id = %channel_id, "Mark read failed: {}", e),
        }
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.state.with(|s| {
            let active = s.pagination.active();
            let channels = s
                .channels
                .iter()
                .map(|c| ChannelEntry {
                    channel: c.clone(),
                    unread: s.reads.unread(c.id),
                    active: Some(c.id) == active,
                })
                .collect();
            let messages = active
                .map(|id| s.store.messages(id).to_vec())
                .unwrap_or_default();
            let uploads = messages
                .iter()
                .filter_map(|m| {
                    let tasks = s.uploads.tasks(m.id);
                    (!tasks.is_empty()).then_some((m.id, tasks))
                })
                .collect();
            ChatSnapshot {
                channels,
                active_channel: active,
                cursor: active.map(|id| s.pagination.cursor(id)).unwrap_or_default(),
                messages,
                uploads,
            }
        })
    }
}
