use uuid::Uuid;

use crate::pagination::Cursor;

/// Scroll position of the message list as reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Distance scrolled from the top of the content.
    pub offset_top: f32,
    pub viewport_height: f32,
    pub content_height: f32,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> f32 {
        (self.content_height - self.viewport_height - self.offset_top).max(0.0)
    }
}

/// What the renderer should do with the scroll position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCommand {
    Stay,
    ToBottom { smooth: bool },
    /// An older page was inserted above `message_id`; keep it where it was.
    /// [`ViewportController::anchored_offset`] gives the new offset once the
    /// new content height is known.
    KeepAnchor { message_id: Option<Uuid> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportMode {
    /// Channel switched, first page not merged yet.
    InitialLoad,
    /// First page merged, waiting for the scroll-to-bottom to land.
    Settling,
    Settled,
}

/// Where new messages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendSource {
    OwnSend,
    Push,
    Reconcile,
}

/// Decides between auto-scrolling and keeping the reader's position.
#[derive(Debug)]
pub struct ViewportController {
    near_top_px: f32,
    near_bottom_px: f32,
    mode: ViewportMode,
    last: Option<ScrollMetrics>,
    anchor: Option<ScrollMetrics>,
}

impl ViewportController {
    pub fn new(near_top_px: f32, near_bottom_px: f32) -> Self {
        Self {
            near_top_px,
            near_bottom_px,
            mode: ViewportMode::InitialLoad,
            last: None,
            anchor: None,
        }
    }

    pub fn mode(&self) -> ViewportMode {
        self.mode
    }

    pub fn last_metrics(&self) -> Option<ScrollMetrics> {
        self.last
    }

    pub fn channel_switched(&mut self) {
        self.mode = ViewportMode::InitialLoad;
        self.last = None;
        self.anchor = None;
    }

    pub fn initial_load_completed(&mut self) -> ScrollCommand {
        self.mode = ViewportMode::Settling;
        ScrollCommand::ToBottom { smooth: true }
    }

    /// The renderer applied the initial scroll, or the content fits without
    /// scrolling.
    pub fn mark_settled(&mut self) {
        if self.mode == ViewportMode::Settling {
            self.mode = ViewportMode::Settled;
        }
    }

    /// True when the last known position is within the bottom threshold.
    /// Unknown position counts as bottom.
    pub fn is_at_bottom(&self) -> bool {
        self.last
            .is_none_or(|m| m.distance_from_bottom() <= self.near_bottom_px)
    }

    /// Record a scroll position. Returns `true` when an older page should be
    /// requested.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, cursor: Cursor) -> bool {
        self.last = Some(metrics);
        if self.mode == ViewportMode::Settling && self.is_at_bottom() {
            self.mode = ViewportMode::Settled;
            return false;
        }
        self.mode == ViewportMode::Settled
            && metrics.offset_top < self.near_top_px
            && cursor.has_more
            && !cursor.loading
    }

    /// Messages were added after the previous newest one.
    pub fn messages_appended(&self, source: AppendSource) -> ScrollCommand {
        match (self.mode, source) {
            (ViewportMode::InitialLoad, _) => ScrollCommand::Stay,
            (_, AppendSource::OwnSend) => ScrollCommand::ToBottom { smooth: true },
            _ if self.is_at_bottom() => ScrollCommand::ToBottom { smooth: true },
            _ => ScrollCommand::Stay,
        }
    }

    /// An older page was merged above `anchor`.
    pub fn older_page_prepended(&mut self, anchor: Option<Uuid>) -> ScrollCommand {
        self.anchor = self.last;
        ScrollCommand::KeepAnchor { message_id: anchor }
    }

    /// Offset that keeps the pre-prepend content in place once the list has
    /// grown to `content_height`.
    pub fn anchored_offset(&mut self, content_height: f32) -> Option<f32> {
        let before = self.anchor.take()?;
        let grown = (content_height - before.content_height).max(0.0);
        Some(before.offset_top + grown)
    }
}
