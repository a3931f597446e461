use std::collections::HashMap;

use uuid::Uuid;

use studyhall_types::api::TimelineItem;
use studyhall_types::models::Message;

/// Outcome of [`MessageStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// New id, placed at the tail.
    Inserted,
    /// Known id, content swapped at its original position.
    Replaced,
}

/// Ordered, id-unique message collection. Display order is first-observed order.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    /// id -> index into `messages`
    positions: HashMap<Uuid, usize>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the tail, or replace in place if the id is already present.
    pub fn append(&mut self, message: Message) -> Appended {
        match self.positions.get(&message.id) {
            Some(&idx) => {
                self.messages[idx] = message;
                Appended::Replaced
            }
            None => {
                self.positions.insert(message.id, self.messages.len());
                self.messages.push(message);
                Appended::Inserted
            }
        }
    }

    /// Delete a message. Returns whether it was present.
    pub fn remove_by_id(&mut self, id: Uuid) -> bool {
        let Some(idx) = self.positions.remove(&id) else {
            return false;
        };
        self.messages.remove(idx);
        for msg in &self.messages[idx..] {
            if let Some(pos) = self.positions.get_mut(&msg.id) {
                *pos -= 1;
            }
        }
        true
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.positions.get(&id).map(|&idx| &self.messages[idx])
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.positions.get(&id).map(|&idx| &mut self.messages[idx])
    }

    /// Index of a message in display order.
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn ordered_view(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ordered view with a day separator wherever the UTC calendar day changes.
    pub fn timeline(&self) -> Vec<TimelineItem> {
        let mut items = Vec::with_capacity(self.messages.len() + 1);
        let mut current_day = None;

        for msg in &self.messages {
            let day = msg.created_at.date_naive();
            if current_day != Some(day) {
                items.push(TimelineItem::DaySeparator(day));
                current_day = Some(day);
            }
            items.push(TimelineItem::Message(msg.clone()));
        }

        items
    }
}
