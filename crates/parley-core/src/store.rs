//! # Conversation Store
//!
//! Owns every chat session of the process and the ordered messages inside
//! them. Sessions are kept in an id-indexed map plus a most-recent-first
//! ordering; exactly one session is current whenever the set is non-empty.
//!
//! Records are shared through `Arc`. A mutation goes through
//! [`Arc::make_mut`], so a consumer holding a [`StoreSnapshot`] keeps seeing
//! the values it was handed while the store moves on to a new revision.
//!
//! Mutations addressed to a session or message that no longer exists are
//! silent no-ops: a reply stream that outlives its session simply has its
//! chunks dropped.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::chat::ReplyChunk;
use crate::lifecycle::MessageStatus;
use crate::types::session::title_from;
use crate::types::{Attachment, ChatSession, Feedback, GroundingMetadata, Message, MessageId, SessionId};

/// Immutable view of the store at one revision
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub current: Option<SessionId>,
    /// Most recent first
    pub sessions: Vec<Arc<ChatSession>>,
}

impl StoreSnapshot {
    pub fn current_session(&self) -> Option<&Arc<ChatSession>> {
        let current = self.current?;
        self.sessions.iter().find(|s| s.id == current)
    }
}

/// In-memory session and message store
#[derive(Debug, Default)]
pub struct ConversationStore {
    sessions: HashMap<SessionId, Arc<ChatSession>>,
    order: Vec<SessionId>,
    current: Option<SessionId>,
    revision: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session, make it current and put it first
    pub fn create_session(&mut self) -> SessionId {
        let session = ChatSession::new();
        let id = session.id;
        self.sessions.insert(id, Arc::new(session));
        self.order.insert(0, id);
        self.current = Some(id);
        self.bump();
        info!(session_id = %id, "Created session");
        id
    }

    /// Remove a session. Unknown ids are ignored.
    pub fn delete_session(&mut self, id: SessionId) {
        if self.sessions.remove(&id).is_none() {
            debug!(session_id = %id, "Delete ignored, no such session");
            return;
        }
        self.order.retain(|s| *s != id);
        if self.current == Some(id) {
            self.current = self.order.first().copied();
        }
        self.bump();
        info!(session_id = %id, remaining = self.order.len(), "Deleted session");
    }

    /// Make an existing session current
    pub fn select_session(&mut self, id: SessionId) -> bool {
        if !self.sessions.contains_key(&id) {
            return false;
        }
        if self.current != Some(id) {
            self.current = Some(id);
            self.bump();
        }
        true
    }

    /// Append a user message. The first message of a session names it.
    pub fn append_user_message(
        &mut self,
        session_id: SessionId,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Option<MessageId> {
        let session = self.session_mut(session_id)?;
        let message = Message::user(text, attachments);
        let id = message.id;

        if session.messages.is_empty() {
            session.title = title_from(text);
        }
        session.messages.push(Arc::new(message));
        session.updated_at = Utc::now();
        self.bump();
        debug!(session_id = %session_id, message_id = %id, "Appended user message");
        Some(id)
    }

    /// Append an empty model reply that chunks will be written into
    pub fn begin_model_reply(&mut self, session_id: SessionId) -> Option<MessageId> {
        let session = self.session_mut(session_id)?;
        let message = Message::model_placeholder();
        let id = message.id;
        session.messages.push(Arc::new(message));
        session.updated_at = Utc::now();
        self.bump();
        debug!(session_id = %session_id, message_id = %id, "Began model reply");
        Some(id)
    }

    /// Concatenate a text delta onto a reply.
    ///
    /// Non-empty grounding metadata replaces whatever the reply held before.
    /// Returns `false` when the chunk was dropped (unknown target or the reply
    /// is already finished).
    pub fn append_reply_chunk(
        &mut self,
        session_id: SessionId,
        message_id: MessageId,
        text_delta: &str,
        grounding: Option<GroundingMetadata>,
    ) -> bool {
        let applied = self.update_message(session_id, message_id, |message| {
            if !message.status.accepts_chunks() {
                return false;
            }
            message.content.push_str(text_delta);
            if let Some(meta) = grounding.filter(|m| !m.is_empty()) {
                message.grounding = Some(meta);
            }
            message.status = MessageStatus::Streaming;
            true
        });

        if !applied {
            trace!(session_id = %session_id, message_id = %message_id, "Dropped reply chunk");
        }
        applied
    }

    /// Apply one streamed element, including the terminal failure element
    pub fn apply_chunk(&mut self, session_id: SessionId, message_id: MessageId, chunk: ReplyChunk) -> bool {
        match chunk {
            ReplyChunk::Delta { text, grounding } => {
                self.append_reply_chunk(session_id, message_id, &text, grounding)
            }
            ReplyChunk::Failed { message } => {
                let separated = match self.message(session_id, message_id) {
                    Some(existing) if !existing.content.is_empty() => format!("\n\n{}", message),
                    _ => message,
                };
                let appended = self.append_reply_chunk(session_id, message_id, &separated, None);
                appended && self.fail_reply(session_id, message_id)
            }
        }
    }

    /// Mark a reply as finished; its content is frozen from now on
    pub fn finish_reply(&mut self, session_id: SessionId, message_id: MessageId) -> bool {
        self.transition(session_id, message_id, MessageStatus::Complete)
    }

    /// Mark a reply as failed; its content is frozen from now on
    pub fn fail_reply(&mut self, session_id: SessionId, message_id: MessageId) -> bool {
        self.transition(session_id, message_id, MessageStatus::Failed)
    }

    /// Record feedback on a finished reply
    pub fn set_feedback(&mut self, session_id: SessionId, message_id: MessageId, feedback: Feedback) -> bool {
        self.update_message(session_id, message_id, |message| {
            if !message.actions_enabled() {
                return false;
            }
            message.feedback = Some(feedback);
            true
        })
    }

    pub fn session(&self, id: SessionId) -> Option<&Arc<ChatSession>> {
        self.sessions.get(&id)
    }

    pub fn message(&self, session_id: SessionId, message_id: MessageId) -> Option<&Arc<Message>> {
        self.sessions.get(&session_id)?.message(message_id)
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.current
    }

    pub fn current(&self) -> Option<&Arc<ChatSession>> {
        self.current.and_then(|id| self.sessions.get(&id))
    }

    /// Sessions, most recent first
    pub fn sessions(&self) -> impl Iterator<Item = &Arc<ChatSession>> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Counter bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            revision: self.revision,
            current: self.current,
            sessions: self.sessions().cloned().collect(),
        }
    }

    fn transition(&mut self, session_id: SessionId, message_id: MessageId, target: MessageStatus) -> bool {
        self.update_message(session_id, message_id, |message| {
            if !message.status.can_transition_to(&target) {
                debug!(
                    message_id = %message_id,
                    "Ignored reply transition {} -> {}",
                    message.status,
                    target
                );
                return false;
            }
            message.status = target;
            if target == MessageStatus::Failed {
                message.is_error = true;
            }
            true
        })
    }

    /// Run `f` on a copy of one message and swap the copy in.
    ///
    /// `f` returns whether it changed anything; the revision is left alone
    /// when the target is missing or `f` declines.
    fn update_message<F>(&mut self, session_id: SessionId, message_id: MessageId, f: F) -> bool
    where
        F: FnOnce(&mut Message) -> bool,
    {
        let Some(index) = self
            .sessions
            .get(&session_id)
            .and_then(|s| s.messages.iter().rposition(|m| m.id == message_id))
        else {
            return false;
        };

        let mut candidate = (*self.sessions[&session_id].messages[index]).clone();
        if !f(&mut candidate) {
            return false;
        }

        if let Some(session) = self.session_mut(session_id) {
            session.messages[index] = Arc::new(candidate);
            session.updated_at = Utc::now();
        }
        self.bump();
        true
    }

    fn session_mut(&mut self, id: SessionId) -> Option<&mut ChatSession> {
        self.sessions.get_mut(&id).map(Arc::make_mut)
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_SESSION_TITLE, IMAGE_ONLY_TITLE};

    fn store_with_session() -> (ConversationStore, SessionId) {
        let mut store = ConversationStore::new();
        let id = store.create_session();
        (store, id)
    }

    #[test]
    fn test_create_session_is_current_and_first() {
        let mut store = ConversationStore::new();
        assert!(store.current_id().is_none());

        let first = store.create_session();
        let second = store.create_session();

        assert_eq!(store.current_id(), Some(second));
        let order: Vec<SessionId> = store.sessions().map(|s| s.id).collect();
        assert_eq!(order, vec![second, first]);
        assert_eq!(store.current().unwrap().title, DEFAULT_SESSION_TITLE);
    }

    #[test]
    fn test_delete_current_falls_back_to_front() {
        let mut store = ConversationStore::new();
        let a = store.create_session();
        let b = store.create_session();
        let c = store.create_session();

        store.select_session(b);
        store.delete_session(b);
        assert_eq!(store.current_id(), Some(c));

        store.delete_session(c);
        assert_eq!(store.current_id(), Some(a));

        store.delete_session(a);
        assert_eq!(store.current_id(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_other_keeps_current() {
        let mut store = ConversationStore::new();
        let a = store.create_session();
        let b = store.create_session();

        store.delete_session(a);
        assert_eq!(store.current_id(), Some(b));
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let (mut store, id) = store_with_session();
        let revision = store.revision();

        store.delete_session(SessionId::new());

        assert_eq!(store.revision(), revision);
        assert_eq!(store.current_id(), Some(id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_select_session() {
        let mut store = ConversationStore::new();
        let a = store.create_session();
        let _b = store.create_session();

        assert!(store.select_session(a));
        assert_eq!(store.current_id(), Some(a));
        assert!(!store.select_session(SessionId::new()));
        assert_eq!(store.current_id(), Some(a));
    }

    #[test]
    fn test_current_invariant_over_mixed_operations() {
        let mut store = ConversationStore::new();
        let mut created = Vec::new();
        // Deterministic LCG so the sequence is reproducible
        let mut seed: u64 = 0x2545_f491;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            match (seed >> 33) % 3 {
                0 => created.push(store.create_session()),
                1 if !created.is_empty() => {
                    let idx = (seed >> 40) as usize % created.len();
                    store.delete_session(created.remove(idx));
                }
                _ => store.delete_session(SessionId::new()),
            }

            match store.current_id() {
                Some(current) => {
                    assert!(!store.is_empty());
                    assert!(store.session(current).is_some());
                }
                None => assert!(store.is_empty()),
            }
            assert_eq!(store.len(), created.len());
        }
    }

    #[test]
    fn test_first_message_sets_title() {
        let (mut store, id) = store_with_session();
        store.append_user_message(id, "Plan a trip", vec![]).unwrap();
        assert_eq!(store.session(id).unwrap().title, "Plan a trip");
    }

    #[test]
    fn test_title_truncated_to_thirty_chars() {
        let (mut store, id) = store_with_session();
        store
            .append_user_message(id, "Explain the history of the Roman empire in detail", vec![])
            .unwrap();
        assert_eq!(store.session(id).unwrap().title, "Explain the history of the Rom");
    }

    #[test]
    fn test_image_only_title() {
        let (mut store, id) = store_with_session();
        store
            .append_user_message(id, "", vec![Attachment::new("image/png", "AAAA")])
            .unwrap();
        assert_eq!(store.session(id).unwrap().title, IMAGE_ONLY_TITLE);
    }

    #[test]
    fn test_title_set_only_once() {
        let (mut store, id) = store_with_session();
        store.append_user_message(id, "first", vec![]).unwrap();
        store.append_user_message(id, "second", vec![]).unwrap();
        assert_eq!(store.session(id).unwrap().title, "first");
    }

    #[test]
    fn test_append_to_unknown_session_is_noop() {
        let (mut store, _) = store_with_session();
        let revision = store.revision();
        assert!(store.append_user_message(SessionId::new(), "hi", vec![]).is_none());
        assert!(store.begin_model_reply(SessionId::new()).is_none());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_placeholder_follows_user_message() {
        let (mut store, id) = store_with_session();
        let user = store.append_user_message(id, "Hi", vec![]).unwrap();
        let reply = store.begin_model_reply(id).unwrap();

        let session = store.session(id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].id, user);
        assert_eq!(session.messages[1].id, reply);
        assert_eq!(session.messages[1].status, MessageStatus::Pending);
        assert!(session.messages[1].content.is_empty());
    }

    #[test]
    fn test_chunks_accumulate_in_order() {
        let (mut store, id) = store_with_session();
        store.append_user_message(id, "Hi", vec![]);
        let split = store.begin_model_reply(id).unwrap();
        for piece in ["Hel", "lo", " world"] {
            assert!(store.append_reply_chunk(id, split, piece, None));
        }

        let whole = store.begin_model_reply(id).unwrap();
        store.append_reply_chunk(id, whole, "Hello world", None);

        assert_eq!(store.message(id, split).unwrap().content, "Hello world");
        assert_eq!(
            store.message(id, split).unwrap().content,
            store.message(id, whole).unwrap().content
        );
        assert_eq!(store.message(id, split).unwrap().status, MessageStatus::Streaming);
    }

    #[test]
    fn test_grounding_last_write_wins() {
        let (mut store, id) = store_with_session();
        let reply = store.begin_model_reply(id).unwrap();
        let a = GroundingMetadata::from_web([("https://a.example", "A")]);
        let b = GroundingMetadata::from_web([("https://b.example", "B"), ("https://c.example", "C")]);

        store.append_reply_chunk(id, reply, "x", Some(a));
        store.append_reply_chunk(id, reply, "y", Some(b.clone()));
        store.append_reply_chunk(id, reply, "z", None);
        store.append_reply_chunk(id, reply, "", Some(GroundingMetadata::default()));

        let message = store.message(id, reply).unwrap();
        assert_eq!(message.grounding.as_ref(), Some(&b));
        assert_eq!(message.content, "xyz");
    }

    #[test]
    fn test_chunks_after_delete_are_dropped() {
        let mut store = ConversationStore::new();
        let other = store.create_session();
        store.append_user_message(other, "keep me", vec![]);
        let doomed = store.create_session();
        store.append_user_message(doomed, "Hi", vec![]);
        let reply = store.begin_model_reply(doomed).unwrap();
        store.append_reply_chunk(doomed, reply, "partial", None);

        let before = store.session(other).unwrap().clone();
        store.delete_session(doomed);
        let revision = store.revision();

        assert!(!store.append_reply_chunk(doomed, reply, " more", None));
        assert!(!store.apply_chunk(doomed, reply, ReplyChunk::failed("Error: gone")));
        assert!(!store.finish_reply(doomed, reply));

        assert_eq!(store.revision(), revision);
        assert!(Arc::ptr_eq(&before, store.session(other).unwrap()));
        assert_eq!(store.current_id(), Some(other));
    }

    #[test]
    fn test_finished_reply_is_frozen() {
        let (mut store, id) = store_with_session();
        let reply = store.begin_model_reply(id).unwrap();
        store.append_reply_chunk(id, reply, "done", None);
        assert!(store.finish_reply(id, reply));

        assert!(!store.append_reply_chunk(id, reply, " late", None));
        assert!(!store.fail_reply(id, reply));

        let message = store.message(id, reply).unwrap();
        assert_eq!(message.content, "done");
        assert_eq!(message.status, MessageStatus::Complete);
        assert!(message.actions_enabled());
    }

    #[test]
    fn test_empty_stream_completes() {
        let (mut store, id) = store_with_session();
        let reply = store.begin_model_reply(id).unwrap();
        assert!(store.finish_reply(id, reply));
        assert_eq!(store.message(id, reply).unwrap().status, MessageStatus::Complete);
    }

    #[test]
    fn test_failure_chunk_keeps_partial_content() {
        let (mut store, id) = store_with_session();
        let reply = store.begin_model_reply(id).unwrap();
        store.apply_chunk(id, reply, ReplyChunk::text("Partial"));
        assert!(store.apply_chunk(id, reply, ReplyChunk::failed("Error: connection reset")));

        let message = store.message(id, reply).unwrap();
        assert_eq!(message.content, "Partial\n\nError: connection reset");
        assert!(message.is_error);
        assert_eq!(message.status, MessageStatus::Failed);
    }

    #[test]
    fn test_failure_as_only_chunk() {
        let (mut store, id) = store_with_session();
        let reply = store.begin_model_reply(id).unwrap();
        store.apply_chunk(id, reply, ReplyChunk::failed("Error: API Key is missing."));

        let message = store.message(id, reply).unwrap();
        assert_eq!(message.content, "Error: API Key is missing.");
        assert!(message.is_error);
    }

    #[test]
    fn test_chunks_never_touch_user_messages() {
        let (mut store, id) = store_with_session();
        let user = store.append_user_message(id, "Hi", vec![]).unwrap();
        assert!(!store.append_reply_chunk(id, user, "!", None));
        assert_eq!(store.message(id, user).unwrap().content, "Hi");
    }

    #[test]
    fn test_feedback_only_on_finished_replies() {
        let (mut store, id) = store_with_session();
        let user = store.append_user_message(id, "Hi", vec![]).unwrap();
        let reply = store.begin_model_reply(id).unwrap();

        assert!(!store.set_feedback(id, reply, Feedback::Positive));
        assert!(!store.set_feedback(id, user, Feedback::Positive));

        store.finish_reply(id, reply);
        assert!(store.set_feedback(id, reply, Feedback::Negative));
        assert_eq!(store.message(id, reply).unwrap().feedback, Some(Feedback::Negative));
    }

    #[test]
    fn test_snapshots_are_not_mutated() {
        let (mut store, id) = store_with_session();
        store.append_user_message(id, "Hi", vec![]);
        let reply = store.begin_model_reply(id).unwrap();
        store.append_reply_chunk(id, reply, "Hel", None);

        let before = store.snapshot();
        store.append_reply_chunk(id, reply, "lo", None);
        let after = store.snapshot();

        let old = before.current_session().unwrap();
        let new = after.current_session().unwrap();
        assert_eq!(old.message(reply).unwrap().content, "Hel");
        assert_eq!(new.message(reply).unwrap().content, "Hello");
        assert!(after.revision > before.revision);

        // The user message record is shared, the reply record was replaced
        assert!(Arc::ptr_eq(&old.messages[0], &new.messages[0]));
        assert!(!Arc::ptr_eq(&old.messages[1], &new.messages[1]));
    }

    #[test]
    fn test_untouched_sessions_are_shared_between_snapshots() {
        let mut store = ConversationStore::new();
        let quiet = store.create_session();
        let busy = store.create_session();
        let reply = store.begin_model_reply(busy).unwrap();

        let before = store.snapshot();
        store.append_reply_chunk(busy, reply, "tick", None);
        let after = store.snapshot();

        let find = |snap: &StoreSnapshot, id| snap.sessions.iter().find(|s| s.id == id).cloned().unwrap();
        assert!(Arc::ptr_eq(&find(&before, quiet), &find(&after, quiet)));
        assert!(!Arc::ptr_eq(&find(&before, busy), &find(&after, busy)));
    }
}
