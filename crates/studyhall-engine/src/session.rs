use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use studyhall_types::api::{OutgoingMessage, ReactionGroup, ReceiptView, SendState, TimelineItem};
use studyhall_types::events::LiveEvent;
use studyhall_types::models::{Classification, Message, Participant, ReadEvent};

use crate::classify::{ClassificationCache, Classifier, classify_or_general};
use crate::config::EngineConfig;
use crate::error::{SessionError, TransportError};
use crate::ledger::{BookmarkSet, CascadeDelete, HelpfulVoteLedger, PinSet, ReactionLedger};
use crate::receipts::{ReadLog, ReceiptProjection};
use crate::store::{Appended, MessageStore};
use crate::transport::{ChatTransport, LiveFeed};
use crate::{search, threads};

/// One open chat session: owns the message store, every annotation map, the
/// live subscription and the in-flight classification tasks.
///
/// Constructed by [`ChatSession::open`] and torn down by [`ChatSession::close`]
/// (or on drop). All state is mutated through the command methods; queries
/// return owned snapshots.
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: EngineConfig,
    transport: Arc<dyn ChatTransport>,
    classifier: Arc<dyn Classifier>,
    /// Cleared on close; every background task checks it before mutating.
    active: AtomicBool,
    state: Mutex<SessionState>,
    tasks: Mutex<Tasks>,
}

#[derive(Default)]
struct SessionState {
    store: MessageStore,
    reactions: ReactionLedger,
    pins: PinSet,
    bookmarks: BookmarkSet,
    helpful: HelpfulVoteLedger,
    labels: ClassificationCache,
    reads: ReadLog,
    /// Ids deleted during this session; a late echo or confirmation must not
    /// bring them back.
    removed: HashSet<Uuid>,
    draft: String,
    outgoing: Vec<OutgoingMessage>,
    next_ticket: u64,
}

#[derive(Default)]
struct Tasks {
    pump: Option<JoinHandle<()>>,
    /// message id -> classifier call in flight
    classify: HashMap<Uuid, JoinHandle<()>>,
}

impl ChatSession {
    /// Subscribe to the live stream, load history and read receipts, then
    /// start merging pushed events.
    ///
    /// The subscription is opened before the history fetch so nothing posted
    /// in between is missed; anything delivered twice merges by id.
    pub async fn open(
        config: EngineConfig,
        transport: Arc<dyn ChatTransport>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, SessionError> {
        let session_id = config.session_id;

        let feed = transport
            .subscribe(session_id)
            .await
            .map_err(|e| SessionError::transport("subscribe", e))?;

        let history = transport
            .fetch_history(session_id, config.history_limit)
            .await
            .map_err(|e| SessionError::transport("fetch history", e))?;

        let reads = transport.fetch_read_events(session_id).await.unwrap_or_else(|e| {
            warn!("Could not load read receipts for session {}: {}", session_id, e);
            vec![]
        });

        let inner = Arc::new(SessionInner {
            config,
            transport,
            classifier,
            active: AtomicBool::new(true),
            state: Mutex::new(SessionState::default()),
            tasks: Mutex::new(Tasks::default()),
        });

        let loaded = history.len();
        for msg in history {
            if msg.session_id != session_id {
                warn!("Dropping history message {} from foreign session {}", msg.id, msg.session_id);
                continue;
            }
            inner.merge(msg);
        }
        {
            let mut state = inner.state();
            for event in reads {
                state.reads.append(event);
            }
        }

        let pump = spawn_pump(&inner, feed);
        inner.tasks().pump = Some(pump);

        info!(
            "Session {} opened for {} ({} messages loaded)",
            session_id, inner.config.user.username, loaded
        );
        Ok(Self { inner })
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.config.session_id
    }

    pub fn user(&self) -> &Participant {
        &self.inner.config.user
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Unsubscribe and discard in-flight classification. Idempotent.
    pub fn close(&self) {
        self.inner.shutdown();
    }

    // -- Compose --

    pub fn draft(&self) -> String {
        self.inner.state().draft.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.inner.state().draft = text.into();
    }

    /// Send whatever is in the draft buffer. If the send is refused or fails,
    /// the text goes back into the draft unless something new was typed.
    pub async fn send_draft(&self, reply_to: Option<Uuid>) -> Result<Message, SessionError> {
        let body = std::mem::take(&mut self.inner.state().draft);
        let result = self.send_message(&body, reply_to).await;
        if result.is_err() {
            let mut state = self.inner.state();
            if state.draft.is_empty() {
                state.draft = body;
            }
        }
        result
    }

    /// Submit a message. The draft is cleared immediately; nothing is put in
    /// the store until the transport confirms and assigns an id. On failure
    /// the text goes back into the draft (unless something new was typed
    /// meanwhile) and is also returned in the error.
    pub async fn send_message(
        &self,
        body: &str,
        reply_to: Option<Uuid>,
    ) -> Result<Message, SessionError> {
        self.inner.ensure_active()?;
        if body.trim().is_empty() {
            return Err(SessionError::EmptyBody);
        }

        let ticket = {
            let mut state = self.inner.state();
            if let Some(parent) = reply_to {
                if !state.store.contains(parent) {
                    return Err(SessionError::UnknownMessage(parent));
                }
            }
            state.draft.clear();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.outgoing.push(OutgoingMessage {
                ticket,
                body: body.to_string(),
                reply_to,
                state: SendState::Sending,
            });
            ticket
        };

        let result = self
            .inner
            .transport
            .send(self.session_id(), &self.inner.config.user, body, reply_to)
            .await;

        match result {
            Ok(msg) => {
                self.inner.state().outgoing.retain(|o| o.ticket != ticket);
                if self.inner.is_active() {
                    debug!("Send confirmed as {}", msg.id);
                    self.inner.merge(msg.clone());
                }
                Ok(msg)
            }
            Err(e) => {
                warn!("Send failed in session {}: {}", self.session_id(), e);
                let mut state = self.inner.state();
                if let Some(out) = state.outgoing.iter_mut().find(|o| o.ticket == ticket) {
                    out.state = SendState::Failed;
                }
                if state.draft.is_empty() {
                    state.draft = body.to_string();
                }
                Err(SessionError::SendFailed {
                    draft: body.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Submitted messages not yet in the store: in flight or failed.
    pub fn outgoing(&self) -> Vec<OutgoingMessage> {
        self.inner.state().outgoing.clone()
    }

    /// Forget failed sends once the UI has shown them.
    pub fn dismiss_failed(&self) {
        self.inner
            .state()
            .outgoing
            .retain(|o| o.state != SendState::Failed);
    }

    // -- Message commands --

    /// Edit a message body. The store changes only after the transport
    /// accepts the edit; the last edit to arrive wins.
    pub async fn edit_message(&self, id: Uuid, body: &str) -> Result<(), SessionError> {
        self.inner.ensure_active()?;
        if body.trim().is_empty() {
            return Err(SessionError::EmptyBody);
        }
        self.inner.ensure_known(id)?;

        self.inner
            .transport
            .edit(id, body)
            .await
            .map_err(|e| SessionError::transport("edit", e))?;

        self.inner.apply_edit(id, body);
        Ok(())
    }

    /// Delete a message and everything keyed by it. A transport that no
    /// longer knows the id counts as already deleted.
    pub async fn delete_message(&self, id: Uuid) -> Result<(), SessionError> {
        self.inner.ensure_active()?;
        self.inner.ensure_known(id)?;

        match self.inner.transport.delete_message(id).await {
            Ok(()) => {}
            Err(TransportError::NotFound(_)) => {
                debug!("Message {} already gone upstream, removing locally", id);
            }
            Err(e) => return Err(SessionError::transport("delete", e)),
        }

        self.inner.remove(id);
        Ok(())
    }

    /// Record that the local user has read up through `id`.
    /// Forwarding to the transport is best-effort.
    pub async fn mark_read(&self, id: Uuid) -> Result<(), SessionError> {
        self.inner.ensure_active()?;
        self.inner.ensure_known(id)?;

        let event = ReadEvent {
            session_id: self.session_id(),
            message_id: id,
            reader: self.inner.config.user.clone(),
        };
        self.inner.state().reads.append(event.clone());

        if let Err(e) = self.inner.transport.mark_read(&event).await {
            warn!("Could not forward read receipt for {}: {}", id, e);
        }
        Ok(())
    }

    // -- Annotation commands --

    /// Returns true if the local user's reaction is now present.
    pub fn toggle_reaction(&self, id: Uuid, emoji: &str) -> Result<bool, SessionError> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(SessionError::EmptyReaction);
        }
        let user_id = self.inner.config.user.id;
        self.inner
            .with_known(id, |state| state.reactions.toggle(id, user_id, emoji))
    }

    pub fn toggle_pin(&self, id: Uuid) -> Result<bool, SessionError> {
        let user_id = self.inner.config.user.id;
        self.inner.with_known(id, |state| state.pins.toggle(id, user_id))
    }

    pub fn toggle_bookmark(&self, id: Uuid) -> Result<bool, SessionError> {
        let user_id = self.inner.config.user.id;
        self.inner.with_known(id, |state| state.bookmarks.toggle(id, user_id))
    }

    pub fn toggle_helpful(&self, id: Uuid) -> Result<bool, SessionError> {
        let user_id = self.inner.config.user.id;
        self.inner.with_known(id, |state| state.helpful.toggle(id, user_id))
    }

    // -- Queries --

    /// Messages in display order, with reaction summaries from the ledger.
    pub fn current_messages(&self) -> Vec<Message> {
        let state = self.inner.state();
        state
            .store
            .ordered_view()
            .iter()
            .map(|m| state.snapshot(m))
            .collect()
    }

    /// Display order with day separators; messages carry ledger reactions
    /// like [`current_messages`](Self::current_messages).
    pub fn timeline(&self) -> Vec<TimelineItem> {
        let state = self.inner.state();
        state
            .store
            .timeline()
            .into_iter()
            .map(|item| match item {
                TimelineItem::Message(msg) => TimelineItem::Message(state.snapshot(&msg)),
                separator => separator,
            })
            .collect()
    }

    pub fn message(&self, id: Uuid) -> Option<Message> {
        let state = self.inner.state();
        state.store.get(id).map(|m| state.snapshot(m))
    }

    pub fn replies_of(&self, id: Uuid) -> Vec<Message> {
        threads::replies_of(&self.inner.state().store, id)
    }

    pub fn reply_count(&self, id: Uuid) -> usize {
        threads::reply_count(&self.inner.state().store, id)
    }

    /// Every reader whose last-read message is `id`, most recent first.
    pub fn readers_of(&self, id: Uuid) -> Vec<Participant> {
        let state = self.inner.state();
        let projection = ReceiptProjection::compute(&state.store, &state.reads);
        projection.readers_of(id).into_iter().cloned().collect()
    }

    /// Capped reader avatars plus the "sent" flag, as the local user sees them.
    pub fn receipt_of(&self, id: Uuid) -> ReceiptView {
        let state = self.inner.state();
        let projection = ReceiptProjection::compute(&state.store, &state.reads);
        projection.receipt_for(
            &state.store,
            id,
            self.inner.config.user.id,
            self.inner.config.receipt_cap,
        )
    }

    pub fn reactions_of(&self, id: Uuid) -> Vec<ReactionGroup> {
        self.inner.state().reactions.groups(id)
    }

    pub fn search(&self, query: &str) -> Vec<Message> {
        search::search(&self.inner.state().store, query)
    }

    /// The label to show for a message; `None` while pending or when `General`.
    pub fn classification_of(&self, id: Uuid) -> Option<Classification> {
        self.inner.state().labels.label_of(id)
    }

    pub fn classification_pending(&self, id: Uuid) -> bool {
        self.inner.state().labels.is_pending(id)
    }

    pub fn is_pinned(&self, id: Uuid) -> bool {
        self.inner.state().pins.is_pinned(id)
    }

    /// Pinned messages in display order.
    pub fn pinned(&self) -> Vec<Message> {
        let state = self.inner.state();
        state
            .store
            .ordered_view()
            .iter()
            .filter(|m| state.pins.is_pinned(m.id))
            .map(|m| state.snapshot(m))
            .collect()
    }

    pub fn is_bookmarked(&self, id: Uuid) -> bool {
        self.inner
            .state()
            .bookmarks
            .is_bookmarked(id, self.inner.config.user.id)
    }

    /// The local user's bookmarks in display order.
    pub fn bookmarked(&self) -> Vec<Message> {
        let user_id = self.inner.config.user.id;
        let state = self.inner.state();
        state
            .store
            .ordered_view()
            .iter()
            .filter(|m| state.bookmarks.is_bookmarked(m.id, user_id))
            .map(|m| state.snapshot(m))
            .collect()
    }

    pub fn helpful_count(&self, id: Uuid) -> usize {
        self.inner.state().helpful.count(id)
    }

    pub fn voted_helpful(&self, id: Uuid) -> bool {
        self.inner
            .state()
            .helpful
            .voted(id, self.inner.config.user.id)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl SessionState {
    fn snapshot(&self, msg: &Message) -> Message {
        let mut msg = msg.clone();
        msg.reactions = self.reactions.groups(msg.id);
        msg
    }

    /// Cascade a removal through every map keyed by message id.
    /// Read events stay: the log is append-only history.
    fn forget(&mut self, id: Uuid) {
        self.reactions.forget_message(id);
        self.pins.forget_message(id);
        self.bookmarks.forget_message(id);
        self.helpful.forget_message(id);
        self.labels.forget_message(id);
    }
}

impl SessionInner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    fn ensure_known(&self, id: Uuid) -> Result<(), SessionError> {
        if self.state().store.contains(id) {
            Ok(())
        } else {
            Err(SessionError::UnknownMessage(id))
        }
    }

    fn with_known<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut SessionState) -> T,
    ) -> Result<T, SessionError> {
        self.ensure_active()?;
        let mut state = self.state();
        if !state.store.contains(id) {
            return Err(SessionError::UnknownMessage(id));
        }
        Ok(f(&mut *state))
    }

    /// Idempotent merge of a message from any source, then classification
    /// the first time its id is seen.
    fn merge(self: &Arc<Self>, msg: Message) {
        let id = msg.id;
        let body = msg.body.clone();

        let first_sighting = {
            let mut state = self.state();
            if state.removed.contains(&id) {
                debug!("Dropping late copy of deleted message {}", id);
                return;
            }
            let seed = msg.reactions.clone();
            if state.store.append(msg) == Appended::Inserted {
                state.reactions.seed(id, &seed);
                debug!("Merged message {}", id);
            }
            state.labels.begin(id)
        };

        if first_sighting {
            self.spawn_classification(id, body);
        }
    }

    fn spawn_classification(self: &Arc<Self>, id: Uuid, body: String) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let classifier = self.classifier.clone();

        // Held across spawn + insert so a fast task can't finish before its
        // handle is registered.
        let mut tasks = self.tasks();
        if !self.is_active() {
            return;
        }
        let handle = tokio::spawn(async move {
            let label = classify_or_general(classifier.as_ref(), id, &body).await;
            if let Some(inner) = weak.upgrade() {
                inner.apply_label(id, label);
            }
        });
        tasks.classify.insert(id, handle);
    }

    fn apply_label(&self, id: Uuid, label: Classification) {
        if !self.is_active() {
            return;
        }
        if self.state().labels.resolve(id, label) {
            debug!("Message {} classified as {}", id, label);
        }
        self.tasks().classify.remove(&id);
    }

    fn apply_edit(&self, id: Uuid, body: &str) {
        let mut state = self.state();
        match state.store.get_mut(id) {
            Some(msg) => {
                msg.body = body.to_string();
                msg.edited = true;
            }
            None => debug!("Edit for unknown message {} ignored", id),
        }
    }

    fn remove(&self, id: Uuid) -> bool {
        let removed = {
            let mut state = self.state();
            state.removed.insert(id);
            let removed = state.store.remove_by_id(id);
            if removed {
                state.forget(id);
            }
            removed
        };

        if removed {
            if let Some(handle) = self.tasks().classify.remove(&id) {
                handle.abort();
            }
            debug!("Removed message {}", id);
        }
        removed
    }

    fn apply_event(self: &Arc<Self>, event: LiveEvent) {
        if event.session_id() != self.config.session_id {
            debug!("Ignoring {} for foreign session {}", event.kind(), event.session_id());
            return;
        }

        match event {
            LiveEvent::MessageCreate(msg) => self.merge(msg),
            LiveEvent::MessageUpdate { id, body, .. } => self.apply_edit(id, &body),
            LiveEvent::MessageDelete { id, .. } => {
                self.remove(id);
            }
            LiveEvent::ReactionAdd {
                message_id,
                user_id,
                emoji,
                ..
            } => {
                let mut state = self.state();
                if state.store.contains(message_id) {
                    state.reactions.add(message_id, user_id, &emoji);
                }
            }
            LiveEvent::ReactionRemove {
                message_id,
                user_id,
                emoji,
                ..
            } => {
                self.state().reactions.remove(message_id, user_id, &emoji);
            }
            LiveEvent::ReadUpdate(event) => self.state().reads.append(event),
        }
    }

    fn shutdown(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        let mut tasks = self.tasks();
        if let Some(pump) = tasks.pump.take() {
            pump.abort();
        }
        let discarded = tasks.classify.len();
        for (_, handle) in tasks.classify.drain() {
            handle.abort();
        }

        info!(
            "Session {} closed ({} classifications discarded)",
            self.config.session_id, discarded
        );
    }
}

fn spawn_pump(inner: &Arc<SessionInner>, mut feed: LiveFeed) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let session_id = inner.config.session_id;

    tokio::spawn(async move {
        while let Some(event) = feed.next().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            if !inner.is_active() {
                break;
            }
            inner.apply_event(event);
        }
        debug!("Live feed for session {} ended", session_id);
    })
}
