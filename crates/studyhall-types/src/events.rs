use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, ReadEvent};

/// Events pushed by the live subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LiveEvent {
    /// A message was posted (by anyone, including the local user's own send echo)
    MessageCreate(Message),

    /// A message body was edited
    MessageUpdate {
        id: Uuid,
        session_id: Uuid,
        body: String,
    },

    /// A message was deleted
    MessageDelete { id: Uuid, session_id: Uuid },

    /// A reaction was added to a message
    ReactionAdd {
        session_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
    },

    /// A reaction was removed from a message
    ReactionRemove {
        session_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
    },

    /// A reader moved their read pointer
    ReadUpdate(ReadEvent),
}

impl LiveEvent {
    /// The session this event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            Self::MessageCreate(msg) => msg.session_id,
            Self::MessageUpdate { session_id, .. } => *session_id,
            Self::MessageDelete { session_id, .. } => *session_id,
            Self::ReactionAdd { session_id, .. } => *session_id,
            Self::ReactionRemove { session_id, .. } => *session_id,
            Self::ReadUpdate(event) => event.session_id,
        }
    }

    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageCreate(_) => "message_create",
            Self::MessageUpdate { .. } => "message_update",
            Self::MessageDelete { .. } => "message_delete",
            Self::ReactionAdd { .. } => "reaction_add",
            Self::ReactionRemove { .. } => "reaction_remove",
            Self::ReadUpdate(_) => "read_update",
        }
    }
}
