use std::collections::HashMap;

use uuid::Uuid;

/// Decides when the active channel is marked read and counts unread
/// messages everywhere else.
#[derive(Debug, Default)]
pub struct ReadTracker {
    active: Option<Uuid>,
    marked_on_activation: bool,
    unread: HashMap<Uuid, usize>,
}

impl ReadTracker {
    pub fn activate(&mut self, channel_id: Uuid) {
        self.active = Some(channel_id);
        self.marked_on_activation = false;
    }

    pub fn deactivate(&mut self) {
        self.active = None;
        self.marked_on_activation = false;
    }

    /// `true` exactly once per activation of `channel_id`.
    pub fn take_activation_mark(&mut self, channel_id: Uuid) -> bool {
        if self.active != Some(channel_id) || self.marked_on_activation {
            return false;
        }
        self.marked_on_activation = true;
        self.unread.remove(&channel_id);
        true
    }

    /// `count` messages from other users arrived in `channel_id`. Returns
    /// `true` when the channel should be marked read now: it is active and
    /// the viewport is at the bottom.
    pub fn messages_arrived(&mut self, channel_id: Uuid, count: usize, at_bottom: bool) -> bool {
        if count == 0 {
            return false;
        }
        if self.active == Some(channel_id) && at_bottom {
            self.unread.remove(&channel_id);
            return true;
        }
        *self.unread.entry(channel_id).or_default() += count;
        false
    }

    /// The reader reached the bottom of the active channel.
    pub fn reached_bottom(&mut self, channel_id: Uuid) -> bool {
        if self.active != Some(channel_id) {
            return false;
        }
        self.unread.remove(&channel_id).is_some_and(|n| n > 0)
    }

    pub fn unread(&self, channel_id: Uuid) -> usize {
        self.unread.get(&channel_id).copied().unwrap_or(0)
    }

    pub fn unread_counts(&self) -> &HashMap<Uuid, usize> {
        &self.unread
    }
}
