use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::ReactionGroup;

/// A session member: the local user of a session, a message author, or a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
}

impl Participant {
    pub fn new(id: Uuid, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            avatar: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub url: String,
}

/// A chat message as assigned and returned by the transport.
/// The id is never generated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    #[serde(default)]
    pub author_avatar: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub reactions: Vec<ReactionGroup>,
}

impl Message {
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

/// "This reader has read up through this message."
/// Append-only: a newer event supersedes an older one only through projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadEvent {
    pub session_id: Uuid,
    pub message_id: Uuid,
    pub reader: Participant,
}

/// Content-intent label attached to a message by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Urgent,
    Question,
    Answer,
    Resource,
    #[default]
    General,
}

impl Classification {
    /// `General` is never surfaced to the UI.
    pub fn visible(self) -> Option<Self> {
        match self {
            Self::General => None,
            other => Some(other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Resource => "resource",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown classification label: {}", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

impl FromStr for Classification {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urgent" => Ok(Self::Urgent),
            "question" => Ok(Self::Question),
            "answer" => Ok(Self::Answer),
            "resource" => Ok(Self::Resource),
            "general" => Ok(Self::General),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}
