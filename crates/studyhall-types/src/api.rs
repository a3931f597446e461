use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Participant};

// -- Reactions --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}

// -- Read receipts --

/// What to draw under a message: the stacked reader avatars, how many more
/// readers did not fit, and whether the plain "sent" glyph applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptView {
    pub readers: Vec<Participant>,
    pub overflow: usize,
    pub sent: bool,
}

impl ReceiptView {
    pub fn total_readers(&self) -> usize {
        self.readers.len() + self.overflow
    }
}

// -- Timeline --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimelineItem {
    DaySeparator(NaiveDate),
    Message(Message),
}

// -- Outgoing messages --

/// State of a submitted message that is not in the message list.
/// Composing is the draft buffer; a confirmed send leaves the outgoing
/// list and shows up as a regular message under its transport-assigned id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendState {
    Sending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub ticket: u64,
    pub body: String,
    pub reply_to: Option<Uuid>,
    pub state: SendState,
}
