use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use intranet_types::api::PageBound;

use crate::error::ServiceError;
use crate::services::MessageService;
use crate::state::ChatState;

/// Per-channel history bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Older messages may exist on the server.
    pub has_more: bool,
    /// A page request for this channel is in flight.
    pub loading: bool,
    /// The latest page has been merged at least once.
    pub loaded: bool,
    /// Oldest message any page response delivered. Only page responses move
    /// it; pushed messages never do.
    pub oldest: Option<PageBound>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            has_more: true,
            loading: false,
            loaded: false,
            oldest: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Latest,
    Older,
}

/// Proof that a page request was started. A response is only applied while
/// its ticket is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub channel_id: Uuid,
    pub kind: PageKind,
    epoch: u64,
}

/// Cursors for every channel seen this session, plus the active channel.
///
/// Each activation starts a new epoch. Tickets from an earlier epoch are
/// stale: their responses are discarded and they no longer own any flag.
#[derive(Debug)]
pub struct Pagination {
    page_size: usize,
    active: Option<Uuid>,
    epoch: u64,
    cursors: HashMap<Uuid, Cursor>,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            active: None,
            epoch: 0,
            cursors: HashMap::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn active(&self) -> Option<Uuid> {
        self.active
    }

    /// Make `channel_id` the active channel. Returns the previously active one.
    pub fn activate(&mut self, channel_id: Uuid) -> Option<Uuid> {
        let previous = self.release_active();
        self.active = Some(channel_id);
        self.cursors.entry(channel_id).or_default();
        previous
    }

    /// No channel is shown any more (view closed).
    pub fn deactivate(&mut self) -> Option<Uuid> {
        self.release_active()
    }

    fn release_active(&mut self) -> Option<Uuid> {
        self.epoch += 1;
        let previous = self.active.take();
        if let Some(cursor) = previous.and_then(|id| self.cursors.get_mut(&id)) {
            cursor.loading = false;
        }
        previous
    }

    /// Start a latest-page load for the active channel.
    pub fn begin_latest(&mut self, channel_id: Uuid) -> Option<LoadTicket> {
        self.begin(channel_id, PageKind::Latest)
    }

    /// Start an older-page load. `None` while another load is in flight,
    /// before the first page arrived, or once history is exhausted.
    pub fn begin_older(&mut self, channel_id: Uuid) -> Option<LoadTicket> {
        let cursor = self.cursor(channel_id);
        if !cursor.loaded || !cursor.has_more {
            return None;
        }
        self.begin(channel_id, PageKind::Older)
    }

    fn begin(&mut self, channel_id: Uuid, kind: PageKind) -> Option<LoadTicket> {
        if self.active != Some(channel_id) {
            return None;
        }
        let cursor = self.cursors.entry(channel_id).or_default();
        if cursor.loading {
            return None;
        }
        cursor.loading = true;
        Some(LoadTicket {
            channel_id,
            kind,
            epoch: self.epoch,
        })
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.epoch == ticket.epoch && self.active == Some(ticket.channel_id)
    }

    /// Record a response of `received` messages whose oldest entry is
    /// `oldest`. Returns `false` (and changes nothing) when the ticket is
    /// stale.
    ///
    /// A latest page restarts the window at its own oldest message; an older
    /// page extends it downwards.
    pub fn complete(
        &mut self,
        ticket: &LoadTicket,
        received: usize,
        oldest: Option<PageBound>,
    ) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let page_size = self.page_size;
        let cursor = self.cursors.entry(ticket.channel_id).or_default();
        cursor.loading = false;
        cursor.loaded = true;
        cursor.has_more = received >= page_size;
        match ticket.kind {
            PageKind::Latest => cursor.oldest = oldest,
            PageKind::Older => cursor.oldest = oldest.or(cursor.oldest),
        }
        true
    }

    /// Whether `bound` lies below the loaded window of `channel_id`. Nothing
    /// is below the window before the first page or once history is complete.
    pub fn is_below_window(&self, channel_id: Uuid, bound: PageBound) -> bool {
        let cursor = self.cursor(channel_id);
        cursor.has_more && cursor.oldest.is_some_and(|oldest| bound < oldest)
    }

    /// Record a failed request. `has_more` is left as it was.
    pub fn fail(&mut self, ticket: &LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if let Some(cursor) = self.cursors.get_mut(&ticket.channel_id) {
            cursor.loading = false;
        }
        true
    }

    pub fn cursor(&self, channel_id: Uuid) -> Cursor {
        self.cursors.get(&channel_id).copied().unwrap_or_default()
    }
}

/// Result of a page request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded {
        kind: PageKind,
        received: usize,
        inserted: usize,
        has_more: bool,
        /// Oldest loaded message when an older page was requested.
        anchor: Option<Uuid>,
    },
    /// Not issued: channel inactive, already loading, or no more history.
    Skipped,
    /// Issued, but the channel was switched before the response arrived.
    Stale,
}

/// Fetches pages from the [`MessageService`] into the shared store.
#[derive(Clone)]
pub struct PaginationEngine {
    service: Arc<dyn MessageService>,
    state: ChatState,
}

impl PaginationEngine {
    pub fn new(service: Arc<dyn MessageService>, state: ChatState) -> Self {
        Self { service, state }
    }

    /// Load the newest page of the active channel.
    pub async fn load_messages(&self, channel_id: Uuid) -> Result<LoadOutcome, ServiceError> {
        let Some(ticket) = self.state.with(|s| s.pagination.begin_latest(channel_id)) else {
            return Ok(LoadOutcome::Skipped);
        };
        self.fetch(ticket, None).await
    }

    /// Load the page preceding the oldest loaded message. Calls made while a
    /// request is pending are no-ops.
    pub async fn load_older_messages(
        &self,
        channel_id: Uuid,
    ) -> Result<LoadOutcome, ServiceError> {
        let started = self.state.with(|s| {
            let ticket = s.pagination.begin_older(channel_id)?;
            Some((ticket, s.pagination.cursor(channel_id).oldest))
        });
        let Some((ticket, before)) = started else {
            return Ok(LoadOutcome::Skipped);
        };
        self.fetch(ticket, before).await
    }

    async fn fetch(
        &self,
        ticket: LoadTicket,
        before: Option<PageBound>,
    ) -> Result<LoadOutcome, ServiceError> {
        let channel_id = ticket.channel_id;
        let limit = self.state.with(|s| s.pagination.page_size());
        debug!(channel_id = %channel_id, kind = ?ticket.kind, ?before, limit, "Requesting page");

        let mut page = match self.service.list_messages(channel_id, before, limit).await {
            Ok(page) => page,
            Err(e) => {
                let current = self.state.with(|s| s.pagination.fail(&ticket));
                warn!(
                    channel_id = %channel_id,
                    kind = ?ticket.kind,
                    current,
                    "Page request failed: {}",
                    e
                );
                return Err(e);
            }
        };
        page.sort_by_key(PageBound::of);
        let received = page.len();
        let oldest = page.first().map(PageBound::of);

        self.state.with(|s| {
            if !s.pagination.complete(&ticket, received, oldest) {
                debug!(channel_id = %channel_id, received, "Discarding stale page");
                return Ok(LoadOutcome::Stale);
            }
            let merged = match ticket.kind {
                PageKind::Latest => {
                    // A full page may not reach what was kept from an earlier
                    // visit. Anything below it is refetched by paging back.
                    if let Some(bound) = oldest.filter(|_| received >= limit) {
                        let dropped = s.store.drop_older_than(channel_id, bound);
                        if dropped > 0 {
                            debug!(channel_id = %channel_id, dropped, "Window restarted at latest page");
                        }
                    }
                    s.store.merge(channel_id, page)
                }
                PageKind::Older => s.store.prepend(channel_id, page),
            };
            let has_more = s.pagination.cursor(channel_id).has_more;
            debug!(
                channel_id = %channel_id,
                kind = ?ticket.kind,
                received,
                inserted = merged.inserted,
                has_more,
                "Page merged"
            );
            Ok(LoadOutcome::Loaded {
                kind: ticket.kind,
                received,
                inserted: merged.inserted,
                has_more,
                anchor: before.map(|b| b.id),
            })
        })
    }
}
