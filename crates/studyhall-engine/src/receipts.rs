//! Read receipts: an append-only log of read events and the projection that
//! places each reader on exactly one message, their current last-read one.
//!
//! The projection is rebuilt from the full log against the current store
//! order on every read. It is not a pointer updated as events arrive, so a
//! message landing between two of a reader's events, or events arriving out
//! of order, cannot skew it.

use std::collections::HashMap;

use uuid::Uuid;

use studyhall_types::api::ReceiptView;
use studyhall_types::models::{Participant, ReadEvent};

use crate::store::MessageStore;

/// Append-only read-event history. Events are never removed, including
/// those that point at deleted messages.
#[derive(Debug, Default)]
pub struct ReadLog {
    events: Vec<ReadEvent>,
}

impl ReadLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: ReadEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ReadEvent] {
        &self.events
    }
}

#[derive(Debug, Clone)]
struct LastRead<'a> {
    message_id: Uuid,
    position: usize,
    /// Log index of the newest event naming this message; orders ties.
    recency: usize,
    reader: &'a Participant,
}

/// Snapshot of every reader's last-read message.
#[derive(Debug)]
pub struct ReceiptProjection<'a> {
    last_read: HashMap<Uuid, LastRead<'a>>,
}

impl<'a> ReceiptProjection<'a> {
    pub fn compute(store: &MessageStore, log: &'a ReadLog) -> Self {
        let mut last_read: HashMap<Uuid, LastRead<'a>> = HashMap::new();

        for (recency, event) in log.events().iter().enumerate() {
            // deleted or not-yet-seen messages take no part
            let Some(position) = store.position(event.message_id) else {
                continue;
            };

            let candidate = LastRead {
                message_id: event.message_id,
                position,
                recency,
                reader: &event.reader,
            };

            match last_read.get_mut(&event.reader.id) {
                Some(current) if position < current.position => {}
                Some(current) => *current = candidate,
                None => {
                    last_read.insert(event.reader.id, candidate);
                }
            }
        }

        Self { last_read }
    }

    /// The message a reader currently has as last-read, if any.
    pub fn last_read_of(&self, reader_id: Uuid) -> Option<Uuid> {
        self.last_read.get(&reader_id).map(|l| l.message_id)
    }

    /// Readers whose last-read message is `message_id`, most recent first.
    pub fn readers_of(&self, message_id: Uuid) -> Vec<&'a Participant> {
        let mut hits: Vec<&LastRead<'a>> = self
            .last_read
            .values()
            .filter(|l| l.message_id == message_id)
            .collect();
        hits.sort_by(|a, b| b.recency.cmp(&a.recency));
        hits.into_iter().map(|l| l.reader).collect()
    }

    /// Display form for one message as seen by `viewer`.
    ///
    /// The viewer's own pointer is not drawn. The "sent" glyph goes on the
    /// viewer's newest own message only while nobody has it as last-read.
    pub fn receipt_for(
        &self,
        store: &MessageStore,
        message_id: Uuid,
        viewer: Uuid,
        cap: usize,
    ) -> ReceiptView {
        let mut readers: Vec<Participant> = self
            .readers_of(message_id)
            .into_iter()
            .filter(|p| p.id != viewer)
            .cloned()
            .collect();

        let sent = readers.is_empty() && latest_own_message(store, viewer) == Some(message_id);

        let overflow = readers.len().saturating_sub(cap);
        readers.truncate(cap);

        ReceiptView {
            readers,
            overflow,
            sent,
        }
    }
}

fn latest_own_message(store: &MessageStore, author_id: Uuid) -> Option<Uuid> {
    store
        .ordered_view()
        .iter()
        .rev()
        .find(|m| m.author_id == author_id)
        .map(|m| m.id)
}
