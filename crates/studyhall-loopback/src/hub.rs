use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use studyhall_engine::{ChatTransport, LiveFeed, TransportError};
use studyhall_types::api::ReactionGroup;
use studyhall_types::events::LiveEvent;
use studyhall_types::models::{Message, Participant, ReadEvent};

/// In-memory chat backend shared by every session that connects to it.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    /// session_id -> messages in post order
    messages: RwLock<HashMap<Uuid, Vec<Message>>>,

    /// session_id -> read receipts in arrival order
    reads: RwLock<HashMap<Uuid, Vec<ReadEvent>>>,

    /// session_id -> (subscription id, sender)
    subscribers: RwLock<HashMap<Uuid, Vec<(Uuid, mpsc::UnboundedSender<LiveEvent>)>>>,

    faults: Mutex<Faults>,
}

#[derive(Default)]
struct Faults {
    failing_sends: usize,
    offline: bool,
    latency: Option<Duration>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Fault injection --

    /// Make the next `n` sends fail with `Unavailable`.
    pub async fn fail_next_sends(&self, n: usize) {
        self.inner.faults.lock().await.failing_sends = n;
    }

    /// While offline every operation fails with `Unavailable`.
    pub async fn set_offline(&self, offline: bool) {
        self.inner.faults.lock().await.offline = offline;
    }

    /// Delay applied to every transport call.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.inner.faults.lock().await.latency = latency;
    }

    // -- Backend-side actions (other members, moderation) --

    /// Post a message as `author`, as if from another client.
    pub async fn post_as(
        &self,
        session_id: Uuid,
        author: &Participant,
        body: &str,
        reply_to: Option<Uuid>,
    ) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            session_id,
            author_id: author.id,
            author_username: author.username.clone(),
            author_avatar: author.avatar.clone(),
            body: body.to_string(),
            created_at: chrono::Utc::now(),
            edited: false,
            attachments: vec![],
            reply_to,
            reactions: vec![],
        };

        self.inner
            .messages
            .write()
            .await
            .entry(session_id)
            .or_default()
            .push(message.clone());

        self.broadcast(LiveEvent::MessageCreate(message.clone())).await;
        message
    }

    /// Toggle a reaction as `user_id`: removes if present, adds if not.
    /// Returns true if the reaction was added.
    pub async fn react_as(&self, session_id: Uuid, message_id: Uuid, user_id: Uuid, emoji: &str) -> bool {
        let added = {
            let mut messages = self.inner.messages.write().await;
            let Some(msg) = messages
                .get_mut(&session_id)
                .and_then(|list| list.iter_mut().find(|m| m.id == message_id))
            else {
                return false;
            };

            let existing = msg.reactions.iter().position(|g| g.emoji == emoji);
            match existing {
                Some(idx) if msg.reactions[idx].user_ids.contains(&user_id) => {
                    let group = &mut msg.reactions[idx];
                    group.user_ids.retain(|u| *u != user_id);
                    group.count = group.user_ids.len();
                    if group.user_ids.is_empty() {
                        msg.reactions.remove(idx);
                    }
                    false
                }
                Some(idx) => {
                    let group = &mut msg.reactions[idx];
                    group.user_ids.push(user_id);
                    group.count = group.user_ids.len();
                    true
                }
                None => {
                    msg.reactions.push(ReactionGroup {
                        emoji: emoji.to_string(),
                        count: 1,
                        user_ids: vec![user_id],
                    });
                    true
                }
            }
        };

        let event = if added {
            LiveEvent::ReactionAdd {
                session_id,
                message_id,
                user_id,
                emoji: emoji.to_string(),
            }
        } else {
            LiveEvent::ReactionRemove {
                session_id,
                message_id,
                user_id,
                emoji: emoji.to_string(),
            }
        };
        self.broadcast(event).await;
        added
    }

    /// Record a read receipt from another member.
    pub async fn read_as(&self, reader: &Participant, session_id: Uuid, message_id: Uuid) {
        let event = ReadEvent {
            session_id,
            message_id,
            reader: reader.clone(),
        };
        self.record_read(event).await;
    }

    pub async fn history(&self, session_id: Uuid) -> Vec<Message> {
        self.inner
            .messages
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Live subscribers for a session that have not hung up.
    pub async fn subscriber_count(&self, session_id: Uuid) -> usize {
        self.inner
            .subscribers
            .read()
            .await
            .get(&session_id)
            .map_or(0, |subs| subs.iter().filter(|(_, tx)| !tx.is_closed()).count())
    }

    /// Deliver an event to every live subscriber of its session,
    /// dropping subscribers whose feed is gone.
    pub async fn broadcast(&self, event: LiveEvent) {
        let session_id = event.session_id();
        let mut subscribers = self.inner.subscribers.write().await;
        let Some(subs) = subscribers.get_mut(&session_id) else {
            return;
        };

        subs.retain(|(sub_id, tx)| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                debug!("Subscription {} hung up, dropping", sub_id);
            }
            delivered
        });
    }

    async fn record_read(&self, event: ReadEvent) {
        self.inner
            .reads
            .write()
            .await
            .entry(event.session_id)
            .or_default()
            .push(event.clone());
        self.broadcast(LiveEvent::ReadUpdate(event)).await;
    }

    /// Apply latency and the offline switch. Returns the error to fail with, if any.
    async fn gate(&self) -> Result<(), TransportError> {
        let (offline, latency) = {
            let faults = self.inner.faults.lock().await;
            (faults.offline, faults.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if offline {
            return Err(TransportError::Unavailable("loopback hub is offline".into()));
        }
        Ok(())
    }

    async fn take_send_fault(&self) -> bool {
        let mut faults = self.inner.faults.lock().await;
        if faults.failing_sends > 0 {
            faults.failing_sends -= 1;
            true
        } else {
            false
        }
    }

    async fn locate(&self, message_id: Uuid) -> Option<Uuid> {
        self.inner
            .messages
            .read()
            .await
            .iter()
            .find(|(_, list)| list.iter().any(|m| m.id == message_id))
            .map(|(session_id, _)| *session_id)
    }
}

#[async_trait]
impl ChatTransport for LoopbackHub {
    async fn fetch_history(&self, session_id: Uuid, limit: u32) -> Result<Vec<Message>, TransportError> {
        self.gate().await?;
        let messages = self.inner.messages.read().await;
        let list = messages.get(&session_id).map(Vec::as_slice).unwrap_or_default();
        let skip = list.len().saturating_sub(limit as usize);
        Ok(list[skip..].to_vec())
    }

    async fn fetch_read_events(&self, session_id: Uuid) -> Result<Vec<ReadEvent>, TransportError> {
        self.gate().await?;
        Ok(self
            .inner
            .reads
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send(
        &self,
        session_id: Uuid,
        author: &Participant,
        body: &str,
        reply_to: Option<Uuid>,
    ) -> Result<Message, TransportError> {
        self.gate().await?;
        if self.take_send_fault().await {
            return Err(TransportError::Unavailable("injected send failure".into()));
        }
        Ok(self.post_as(session_id, author, body, reply_to).await)
    }

    async fn edit(&self, message_id: Uuid, body: &str) -> Result<(), TransportError> {
        self.gate().await?;
        let session_id = {
            let mut messages = self.inner.messages.write().await;
            let Some(msg) = messages
                .values_mut()
                .flat_map(|list| list.iter_mut())
                .find(|m| m.id == message_id)
            else {
                return Err(TransportError::NotFound(message_id));
            };
            msg.body = body.to_string();
            msg.edited = true;
            msg.session_id
        };

        self.broadcast(LiveEvent::MessageUpdate {
            id: message_id,
            session_id,
            body: body.to_string(),
        })
        .await;
        Ok(())
    }

    async fn delete_message(&self, message_id: Uuid) -> Result<(), TransportError> {
        self.gate().await?;
        let Some(session_id) = self.locate(message_id).await else {
            return Err(TransportError::NotFound(message_id));
        };

        if let Some(list) = self.inner.messages.write().await.get_mut(&session_id) {
            list.retain(|m| m.id != message_id);
        }

        self.broadcast(LiveEvent::MessageDelete {
            id: message_id,
            session_id,
        })
        .await;
        Ok(())
    }

    async fn mark_read(&self, event: &ReadEvent) -> Result<(), TransportError> {
        self.gate().await?;
        self.record_read(event.clone()).await;
        Ok(())
    }

    async fn subscribe(&self, session_id: Uuid) -> Result<LiveFeed, TransportError> {
        self.gate().await?;
        let sub_id = Uuid::new_v4();
        let (tx, feed) = LiveFeed::channel();
        self.inner
            .subscribers
            .write()
            .await
            .entry(session_id)
            .or_default()
            .push((sub_id, tx));

        info!("Subscription {} opened for session {}", sub_id, session_id);
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> Participant {
        Participant::new(Uuid::new_v4(), name)
    }

    #[tokio::test]
    async fn post_reaches_subscribers_of_same_session_only() {
        let hub = LoopbackHub::new();
        let session = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut feed = hub.subscribe(session).await.unwrap();
        let mut other_feed = hub.subscribe(other).await.unwrap();

        let posted = hub.post_as(session, &member("ana"), "hello", None).await;

        match feed.next().await {
            Some(LiveEvent::MessageCreate(msg)) => assert_eq!(msg.id, posted.id),
            other => panic!("unexpected event: {other:?}"),
        }
        hub.post_as(other, &member("bo"), "elsewhere", None).await;
        match other_feed.next().await {
            Some(LiveEvent::MessageCreate(msg)) => assert_eq!(msg.body, "elsewhere"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_feed_is_pruned() {
        let hub = LoopbackHub::new();
        let session = Uuid::new_v4();
        let feed = hub.subscribe(session).await.unwrap();
        assert_eq!(hub.subscriber_count(session).await, 1);

        drop(feed);
        assert_eq!(hub.subscriber_count(session).await, 0);
        hub.post_as(session, &member("ana"), "anyone?", None).await;
        assert!(hub.inner.subscribers.read().await[&session].is_empty());
    }

    #[tokio::test]
    async fn history_respects_limit_and_keeps_order() {
        let hub = LoopbackHub::new();
        let session = Uuid::new_v4();
        let ana = member("ana");
        for body in ["one", "two", "three"] {
            hub.post_as(session, &ana, body, None).await;
        }

        let bodies: Vec<String> = hub
            .fetch_history(session, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["two", "three"]);
    }

    #[tokio::test]
    async fn injected_send_failure_is_one_shot() {
        let hub = LoopbackHub::new();
        let session = Uuid::new_v4();
        let ana = member("ana");
        hub.fail_next_sends(1).await;

        assert!(matches!(
            hub.send(session, &ana, "first", None).await,
            Err(TransportError::Unavailable(_))
        ));
        assert!(hub.send(session, &ana, "second", None).await.is_ok());
        assert_eq!(hub.history(session).await.len(), 1);
    }

    #[tokio::test]
    async fn react_as_toggles() {
        let hub = LoopbackHub::new();
        let session = Uuid::new_v4();
        let ana = member("ana");
        let msg = hub.post_as(session, &ana, "vote", None).await;

        assert!(hub.react_as(session, msg.id, ana.id, "👍").await);
        assert_eq!(hub.history(session).await[0].reactions[0].count, 1);
        assert!(!hub.react_as(session, msg.id, ana.id, "👍").await);
        assert!(hub.history(session).await[0].reactions.is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let hub = LoopbackHub::new();
        let id = Uuid::new_v4();
        assert_eq!(hub.delete_message(id).await, Err(TransportError::NotFound(id)));
    }
}
