//! In-memory collaborators for driving a `ChatView` without a network.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use intranet_chat::{
    AuthSession, ChatConfig, ChatView, FileStorage, LocalFile, MessageService, ServiceError,
    UploadProgress,
};
use intranet_types::api::{PageBound, StoredFile};
use intranet_types::models::{Attachment, Channel, ChannelType, Message, MessageType};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[derive(Default)]
struct Inner {
    channels: Vec<Channel>,
    messages: Vec<Message>,
    clock: i64,
    fail_lists: bool,
    fail_create: bool,
    get_failures: u32,
    reads: Vec<Uuid>,
}

/// Persistence service backed by a vector. Lists return newest-first.
pub struct FakeBackend {
    inner: Mutex<Inner>,
    gates: Mutex<HashMap<Uuid, Arc<Notify>>>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                clock: 100_000,
                ..Inner::default()
            }),
            gates: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        })
    }

    pub fn add_channel(&self, name: &str) -> Uuid {
        let channel = Channel {
            id: Uuid::new_v4(),
            name: name.to_string(),
            channel_type: ChannelType::Public,
            description: None,
            created_at: at(0),
        };
        let id = channel.id;
        self.inner.lock().unwrap().channels.push(channel);
        id
    }

    /// Insert `count` messages with timestamps `offset..offset + count`.
    pub fn seed(&self, channel_id: Uuid, offset: i64, count: usize) -> Vec<Message> {
        let author = Uuid::new_v4();
        let seeded: Vec<Message> = (0..count as i64)
            .map(|i| message(channel_id, author, offset + i, &format!("m{}", offset + i)))
            .collect();
        self.inner.lock().unwrap().messages.extend(seeded.iter().cloned());
        seeded
    }

    /// Insert `count` messages that all carry the timestamp `secs`.
    pub fn seed_tied(&self, channel_id: Uuid, secs: i64, count: usize) -> Vec<Message> {
        let author = Uuid::new_v4();
        let seeded: Vec<Message> = (0..count)
            .map(|i| message(channel_id, author, secs, &format!("t{i}")))
            .collect();
        self.inner.lock().unwrap().messages.extend(seeded.iter().cloned());
        seeded
    }

    /// A message by another user, stored server-side and returned for pushing.
    pub fn post_from(&self, channel_id: Uuid, user_id: Uuid, content: &str) -> Message {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let msg = message(channel_id, user_id, inner.clock, content);
        inner.messages.push(msg.clone());
        msg
    }

    /// Hold `list_messages` for `channel_id` until the returned gate is notified.
    pub fn hold_lists(&self, channel_id: Uuid) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(channel_id, gate.clone());
        gate
    }

    pub fn release_lists(&self, channel_id: Uuid) {
        self.gates.lock().unwrap().remove(&channel_id);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.inner.lock().unwrap().fail_lists = fail;
    }

    pub fn fail_create(&self, fail: bool) {
        self.inner.lock().unwrap().fail_create = fail;
    }

    pub fn fail_next_gets(&self, count: u32) {
        self.inner.lock().unwrap().get_failures = count;
    }

    pub fn attach(&self, message_id: Uuid, attachment: Attachment) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(m) = inner.messages.iter_mut().find(|m| m.id == message_id) {
            m.attachments.push(attachment);
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> Vec<Uuid> {
        self.inner.lock().unwrap().reads.clone()
    }
}

fn message(channel_id: Uuid, user_id: Uuid, secs: i64, content: &str) -> Message {
    Message {
        id: Uuid::new_v4(),
        channel_id,
        user_id,
        content: content.to_string(),
        message_type: MessageType::Text,
        created_at: at(secs),
        is_deleted: false,
        attachments: vec![],
        reactions: vec![],
    }
}

#[async_trait]
impl MessageService for FakeBackend {
    async fn list_channels(&self) -> Result<Vec<Channel>, ServiceError> {
        Ok(self.inner.lock().unwrap().channels.clone())
    }

    async fn list_messages(
        &self,
        channel_id: Uuid,
        before: Option<PageBound>,
        limit: usize,
    ) -> Result<Vec<Message>, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().get(&channel_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let inner = self.inner.lock().unwrap();
        if inner.fail_lists {
            return Err(ServiceError::Transport("connection reset".into()));
        }
        let mut page: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .filter(|m| before.is_none_or(|b| PageBound::of(m) < b))
            .cloned()
            .collect();
        page.sort_by_key(|m| std::cmp::Reverse(PageBound::of(m)));
        page.truncate(limit);
        Ok(page)
    }

    async fn create_message(
        &self,
        channel_id: Uuid,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_create {
            return Err(ServiceError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        inner.clock += 1;
        let mut msg = message(channel_id, ME, inner.clock, content);
        msg.message_type = message_type;
        inner.messages.push(msg.clone());
        Ok(msg)
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Message, ServiceError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        if inner.get_failures > 0 {
            inner.get_failures -= 1;
            return Err(ServiceError::Transport("timeout".into()));
        }
        inner
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or(ServiceError::NotFound)
    }

    async fn mark_read(&self, channel_id: Uuid) -> Result<(), ServiceError> {
        self.inner.lock().unwrap().reads.push(channel_id);
        Ok(())
    }
}

/// File storage that succeeds unless the file name was marked failing.
pub struct FakeStorage {
    backend: Arc<FakeBackend>,
    failing: Mutex<HashSet<String>>,
    associate: bool,
    uploads: AtomicUsize,
}

impl FakeStorage {
    /// Successful uploads attach the file to the message server-side.
    pub fn new(backend: Arc<FakeBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            failing: Mutex::new(HashSet::new()),
            associate: true,
            uploads: AtomicUsize::new(0),
        })
    }

    /// Uploads succeed but the server never associates them with the message.
    pub fn detached(backend: Arc<FakeBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            failing: Mutex::new(HashSet::new()),
            associate: false,
            uploads: AtomicUsize::new(0),
        })
    }

    pub fn fail_file(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStorage for FakeStorage {
    async fn upload_file(
        &self,
        file: &LocalFile,
        message_id: Uuid,
        access_token: &str,
        progress: Arc<UploadProgress>,
    ) -> Result<StoredFile, ServiceError> {
        assert_eq!(access_token, TOKEN);
        self.uploads.fetch_add(1, Ordering::SeqCst);
        progress.advance(file.size() / 2);
        tokio::task::yield_now().await;

        if self.failing.lock().unwrap().contains(&file.name) {
            return Err(ServiceError::Status {
                status: 500,
                body: "storage quota exceeded".into(),
            });
        }

        progress.advance(file.size() - file.size() / 2);
        let url = format!("https://files.test/{}/{}", message_id, file.name);
        let attachment_id = Uuid::new_v4();
        if self.associate {
            self.backend.attach(
                message_id,
                Attachment {
                    id: attachment_id,
                    message_id,
                    file_name: file.name.clone(),
                    file_type: file.mime_type.clone(),
                    file_size: file.size(),
                    file_url: url.clone(),
                    thumbnail_url: None,
                },
            );
        }
        Ok(StoredFile {
            url,
            thumbnail_url: None,
            file_type: file.mime_type.clone(),
            file_size: file.size(),
            attachment_id: Some(attachment_id),
        })
    }
}

pub const ME: Uuid = Uuid::from_u128(0x5eed);
pub const TOKEN: &str = "test-token";

pub struct FakeAuth {
    pub signed_in: bool,
}

impl AuthSession for FakeAuth {
    fn user_id(&self) -> Option<Uuid> {
        self.signed_in.then_some(ME)
    }

    fn access_token(&self) -> Option<String> {
        self.signed_in.then(|| TOKEN.to_string())
    }
}

pub fn config(page_size: usize) -> ChatConfig {
    ChatConfig {
        page_size,
        reconcile_delay: Duration::ZERO,
        ..ChatConfig::default()
    }
}

pub fn view_with(backend: &Arc<FakeBackend>, storage: &Arc<FakeStorage>, page_size: usize) -> ChatView {
    ChatView::new(
        config(page_size),
        backend.clone(),
        storage.clone(),
        Arc::new(FakeAuth { signed_in: true }),
    )
}

pub fn view(backend: &Arc<FakeBackend>, page_size: usize) -> ChatView {
    let storage = FakeStorage::new(backend.clone());
    view_with(backend, &storage, page_size)
}

pub fn contents(view: &ChatView) -> Vec<String> {
    view.snapshot()
        .messages
        .iter()
        .map(|m| m.content.clone())
        .collect()
}
