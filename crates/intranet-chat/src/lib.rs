//! Channel messaging client core.
//!
//! Keeps live chat state (channels, messages, attachments, read state) for
//! one session and reconciles it with asynchronous collaborator responses:
//!
//! - [`store::MessageStore`]: per-channel ordered, deduplicated message lists
//! - [`pagination::PaginationEngine`]: latest-page and backward history loads
//! - [`upload::AttachmentUploader`]: single-file uploads with progress tasks
//! - [`send::SendPipeline`]: optimistic send, parallel uploads, reconciliation
//! - [`viewport::ViewportController`]: scroll policy
//! - [`read_tracker::ReadTracker`]: mark-read and unread bookkeeping
//! - [`view::ChatView`]: composition root
//!
//! Everything runs as cooperative tasks; state is only touched between
//! suspension points, through [`state::ChatState`].

pub mod config;
pub mod error;
pub mod pagination;
pub mod read_tracker;
pub mod send;
pub mod services;
pub mod state;
pub mod store;
pub mod upload;
pub mod view;
pub mod viewport;

pub use config::ChatConfig;
pub use error::{SendError, ServiceError, UploadFailure};
pub use pagination::{Cursor, LoadOutcome, PageKind, PaginationEngine};
pub use send::{Draft, PendingSend, ReconcileSource, SendOutcome, SendPipeline, SendState};
pub use services::{AuthSession, FileStorage, MessageService};
pub use state::ChatState;
pub use store::{MergeOutcome, MessageStore};
pub use upload::{AttachmentUploader, LocalFile, UploadKey, UploadProgress, UploadStatus, UploadTask};
pub use view::{ChannelEntry, ChatSnapshot, ChatView, ViewUpdate};
pub use viewport::{AppendSource, ScrollCommand, ScrollMetrics, ViewportController, ViewportMode};
