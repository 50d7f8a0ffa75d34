use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use intranet_types::models::Channel;

use crate::config::ChatConfig;
use crate::pagination::Pagination;
use crate::read_tracker::ReadTracker;
use crate::store::MessageStore;
use crate::upload::UploadBoard;
use crate::viewport::ViewportController;

/// Everything a chat session knows, owned by one [`ChatState`].
#[derive(Debug)]
pub struct StateInner {
    pub channels: Vec<Channel>,
    pub store: MessageStore,
    pub pagination: Pagination,
    pub uploads: UploadBoard,
    pub viewport: ViewportController,
    pub reads: ReadTracker,
}

/// Shared handle to the session state.
///
/// Constructed once per session and passed to each component. Access goes
/// through [`ChatState::with`], which never spans a suspension point, so
/// every update is atomic with respect to the other tasks of the session.
#[derive(Debug, Clone)]
pub struct ChatState {
    inner: Arc<Mutex<StateInner>>,
}

impl ChatState {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StateInner {
                channels: Vec::new(),
                store: MessageStore::new(),
                pagination: Pagination::new(config.page_size),
                uploads: UploadBoard::default(),
                viewport: ViewportController::new(config.near_top_px, config.near_bottom_px),
                reads: ReadTracker::default(),
            })),
        }
    }

    pub fn with<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut StateInner) -> T,
    {
        let mut guard = self.lock();
        f(&mut guard)
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        // Plain data, keep going after a poisoned lock.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
