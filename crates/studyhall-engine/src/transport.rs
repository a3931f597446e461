use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use studyhall_types::events::LiveEvent;
use studyhall_types::models::{Message, Participant, ReadEvent};

use crate::error::TransportError;

/// Receiving end of a live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct LiveFeed {
    rx: mpsc::UnboundedReceiver<LiveEvent>,
}

impl LiveFeed {
    /// A connected (sender, feed) pair for transports to hand out.
    pub fn channel() -> (mpsc::UnboundedSender<LiveEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Next pushed event, or `None` once the transport side hangs up.
    pub async fn next(&mut self) -> Option<LiveEvent> {
        self.rx.recv().await
    }
}

/// Network collaborator of a chat session. Ids on returned messages are
/// assigned here, never by the engine, and must be stable across the send
/// confirmation and the live echo of the same message.
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    async fn fetch_history(&self, session_id: Uuid, limit: u32) -> Result<Vec<Message>, TransportError>;

    async fn fetch_read_events(&self, _session_id: Uuid) -> Result<Vec<ReadEvent>, TransportError> {
        Ok(vec![])
    }

    async fn send(
        &self,
        session_id: Uuid,
        author: &Participant,
        body: &str,
        reply_to: Option<Uuid>,
    ) -> Result<Message, TransportError>;

    async fn edit(&self, message_id: Uuid, body: &str) -> Result<(), TransportError>;

    async fn delete_message(&self, message_id: Uuid) -> Result<(), TransportError>;

    async fn mark_read(&self, _event: &ReadEvent) -> Result<(), TransportError> {
        Ok(())
    }

    async fn subscribe(&self, session_id: Uuid) -> Result<LiveFeed, TransportError>;
}
