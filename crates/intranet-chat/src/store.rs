use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{trace, warn};
use uuid::Uuid;

use intranet_types::api::PageBound;
use intranet_types::models::Message;

/// What a merge did to a channel's list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Messages whose id was not present before.
    pub inserted: usize,
    /// Messages that replaced a stored message with the same id.
    pub replaced: usize,
    /// Inserted messages that landed after the previous newest message.
    pub appended: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.inserted + self.replaced > 0
    }
}

/// Per-channel message lists, kept sorted by `created_at` ascending with
/// unique ids.
///
/// Incoming messages with a known id replace the stored copy. Fetch
/// responses, reconciliation re-fetches and push events all land here, so
/// repeated delivery of the same message is harmless.
#[derive(Debug, Default)]
pub struct MessageStore {
    channels: HashMap<Uuid, Vec<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `messages` in `channel_id`'s list.
    ///
    /// Messages that belong to another channel are dropped.
    pub fn merge<I>(&mut self, channel_id: Uuid, messages: I) -> MergeOutcome
    where
        I: IntoIterator<Item = Message>,
    {
        let list = self.channels.entry(channel_id).or_default();
        let newest_before = list.last().map(|m| (m.created_at, m.id));

        let mut index: HashMap<Uuid, usize> =
            list.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
        let mut outcome = MergeOutcome::default();

        for message in messages {
            if message.channel_id != channel_id {
                warn!(
                    channel_id = %channel_id,
                    message_id = %message.id,
                    other_channel = %message.channel_id,
                    "Dropping message merged into the wrong channel"
                );
                continue;
            }

            match index.get(&message.id) {
                Some(&pos) => {
                    list[pos] = message;
                    outcome.replaced += 1;
                }
                None => {
                    if newest_before
                        .is_none_or(|newest| (message.created_at, message.id) > newest)
                    {
                        outcome.appended += 1;
                    }
                    index.insert(message.id, list.len());
                    list.push(message);
                    outcome.inserted += 1;
                }
            }
        }

        if outcome.inserted > 0 {
            list.sort_by(compare);
        } else if outcome.replaced > 0 && !is_sorted(list) {
            // A replacement carrying a different timestamp.
            list.sort_by(compare);
        }

        trace!(
            channel_id = %channel_id,
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            total = list.len(),
            "Merged messages"
        );
        outcome
    }

    /// Merge a page that precedes the current oldest message.
    ///
    /// Overlap with already stored messages is tolerated and deduplicated.
    pub fn prepend(&mut self, channel_id: Uuid, older: Vec<Message>) -> MergeOutcome {
        if let Some(oldest) = self.oldest(channel_id) {
            let oldest_at = oldest.created_at;
            let overlapping = older.iter().filter(|m| m.created_at > oldest_at).count();
            if overlapping > 0 {
                warn!(
                    channel_id = %channel_id,
                    overlapping,
                    "Older page overlaps stored messages"
                );
            }
        }
        self.merge(channel_id, older)
    }

    /// Apply `patch` to a stored message and merge the result back.
    /// Returns `false` when the message is not stored.
    pub fn update<F>(&mut self, channel_id: Uuid, message_id: Uuid, patch: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        let Some(mut message) = self.get(channel_id, message_id).cloned() else {
            return false;
        };
        patch(&mut message);
        self.merge(channel_id, [message]);
        true
    }

    pub fn messages(&self, channel_id: Uuid) -> &[Message] {
        self.channels
            .get(&channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, channel_id: Uuid, message_id: Uuid) -> Option<&Message> {
        self.messages(channel_id).iter().find(|m| m.id == message_id)
    }

    pub fn oldest(&self, channel_id: Uuid) -> Option<&Message> {
        self.messages(channel_id).first()
    }

    pub fn newest(&self, channel_id: Uuid) -> Option<&Message> {
        self.messages(channel_id).last()
    }

    /// Remove every message ordered before `bound`. Returns how many went.
    pub fn drop_older_than(&mut self, channel_id: Uuid, bound: PageBound) -> usize {
        let Some(list) = self.channels.get_mut(&channel_id) else {
            return 0;
        };
        let keep_from = list.partition_point(|m| PageBound::of(m) < bound);
        list.drain(..keep_from).count()
    }

    pub fn len(&self, channel_id: Uuid) -> usize {
        self.messages(channel_id).len()
    }

    pub fn is_empty(&self, channel_id: Uuid) -> bool {
        self.len(channel_id) == 0
    }
}

fn compare(a: &Message, b: &Message) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

fn is_sorted(list: &[Message]) -> bool {
    list.windows(2).all(|w| compare(&w[0], &w[1]) != Ordering::Greater)
}
