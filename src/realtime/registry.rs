//! Session Registry: process-wide bookkeeping for live socket connections.
//!
//! Owns four small tables (session to handle, conversation to joined
//! sessions, user to live sessions, conversation to last typing notice) plus
//! the per-conversation send locks that keep persist-then-broadcast sequences
//! for one conversation from interleaving. Mutation points are exactly
//! `connect`, `join`, `note_typing` and `disconnect`. Every table sits behind
//! a single mutex and no lock is held across an await.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use uuid::Uuid;

use crate::models::ServerEvent;

/// How long a typing notice stays fresh without a refresh.
pub const TYPING_TTL: Duration = Duration::from_secs(3);

/// Identifier of one live connection.
pub type SessionId = String;

struct SessionHandle {
    user_id: String,
    tx: UnboundedSender<ServerEvent>,
}

struct TypingNotice {
    user_id: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, SessionHandle>,
    rooms: HashMap<String, HashSet<SessionId>>,
    online: HashMap<String, HashSet<SessionId>>,
    typing: HashMap<String, TypingNotice>,
}

#[derive(Default)]
pub struct SessionRegistry {
    tables: Mutex<Tables>,
    send_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a verified connection and hands back its session id and
    /// outbound event channel.
    pub fn connect(&self, user_id: &str) -> (SessionId, UnboundedReceiver<ServerEvent>) {
        let session_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut tables = self.tables.lock().unwrap();
        tables.sessions.insert(
            session_id.clone(),
            SessionHandle { user_id: user_id.to_string(), tx },
        );
        tables
            .online
            .entry(user_id.to_string())
            .or_default()
            .insert(session_id.clone());
        debug!("Session {session_id} opened for user {user_id}");
        (session_id, rx)
    }

    /// Adds the session to a conversation room. Joining an already-joined
    /// room is a no-op.
    pub fn join(&self, session_id: &str, chat_id: &str) {
        let mut tables = self.tables.lock().unwrap();
        if !tables.sessions.contains_key(session_id) {
            return;
        }
        tables
            .rooms
            .entry(chat_id.to_string())
            .or_default()
            .insert(session_id.to_string());
    }

    /// Removes the session from every table. Typing notices are left to
    /// expire on their own.
    pub fn disconnect(&self, session_id: &str) {
        let mut tables = self.tables.lock().unwrap();
        let Some(handle) = tables.sessions.remove(session_id) else {
            return;
        };
        if let Some(sessions) = tables.online.get_mut(&handle.user_id) {
            sessions.remove(session_id);
            if sessions.is_empty() {
                tables.online.remove(&handle.user_id);
            }
        }
        for members in tables.rooms.values_mut() {
            members.remove(session_id);
        }
        tables.rooms.retain(|_, members| !members.is_empty());
        debug!("Session {session_id} closed for user {}", handle.user_id);
    }

    /// Whether the user has at least one live session.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.tables.lock().unwrap().online.contains_key(user_id)
    }

    /// Delivers an event to a single session. Returns false if the session
    /// is gone or its channel is closed.
    pub fn send_to(&self, session_id: &str, event: ServerEvent) -> bool {
        let tables = self.tables.lock().unwrap();
        tables
            .sessions
            .get(session_id)
            .map(|handle| handle.tx.send(event).is_ok())
            .unwrap_or(false)
    }

    /// Delivers an event to every session joined to the room, the sender's
    /// own sessions included. Returns how many sessions accepted it.
    pub fn broadcast(&self, chat_id: &str, event: ServerEvent) -> usize {
        self.broadcast_filtered(chat_id, event, None)
    }

    /// Same as [`Self::broadcast`] but skips one session; a typing sender
    /// never hears its own notice.
    pub fn broadcast_except(&self, chat_id: &str, skip: &str, event: ServerEvent) -> usize {
        self.broadcast_filtered(chat_id, event, Some(skip))
    }

    fn broadcast_filtered(&self, chat_id: &str, event: ServerEvent, skip: Option<&str>) -> usize {
        let tables = self.tables.lock().unwrap();
        let Some(members) = tables.rooms.get(chat_id) else {
            return 0;
        };
        let mut delivered = 0;
        for session_id in members {
            if skip == Some(session_id.as_str()) {
                continue;
            }
            if let Some(handle) = tables.sessions.get(session_id) {
                // A closed channel means the connection is tearing down; it
                // must not affect delivery to the rest of the room.
                if handle.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Records a typing notice for the conversation.
    pub fn note_typing(&self, chat_id: &str, user_id: &str) {
        self.note_typing_at(chat_id, user_id, Instant::now());
    }

    /// Who is typing in the conversation, if the last notice is still fresh.
    /// Expired entries are dropped on read, so no per-keystroke timer is
    /// armed and a disconnect mid-typing needs no cleanup.
    pub fn typing_user(&self, chat_id: &str) -> Option<String> {
        self.typing_user_at(chat_id, Instant::now())
    }

    fn note_typing_at(&self, chat_id: &str, user_id: &str, now: Instant) {
        let mut tables = self.tables.lock().unwrap();
        tables.typing.insert(
            chat_id.to_string(),
            TypingNotice { user_id: user_id.to_string(), expires_at: now + TYPING_TTL },
        );
    }

    fn typing_user_at(&self, chat_id: &str, now: Instant) -> Option<String> {
        let mut tables = self.tables.lock().unwrap();
        match tables.typing.get(chat_id) {
            Some(notice) if notice.expires_at > now => Some(notice.user_id.clone()),
            Some(_) => {
                tables.typing.remove(chat_id);
                None
            }
            None => None,
        }
    }

    /// The lock serializing persist-then-broadcast for one conversation, so
    /// room members observe new messages in store append order.
    pub fn conversation_lock(&self, chat_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.send_locks.lock().unwrap();
        locks
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageView, PublicUser};
    use chrono::Utc;

    fn typing_event(chat_id: &str, user_id: &str) -> ServerEvent {
        ServerEvent::UserTyping {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    fn message_event(chat_id: &str, content: &str) -> ServerEvent {
        ServerEvent::NewMessage {
            chat_id: chat_id.to_string(),
            message: MessageView {
                id: Uuid::new_v4().to_string(),
                sender: PublicUser {
                    id: "sender".into(),
                    name: "Sender".into(),
                    email: "sender@example.com".into(),
                    profile_picture: String::new(),
                },
                content: content.to_string(),
                timestamp: Utc::now(),
            },
        }
    }

    fn content_of(event: ServerEvent) -> String {
        match event {
            ServerEvent::NewMessage { message, .. } => message.content,
            other => panic!("expected new_message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_joined_session_including_sender() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = registry.connect("alice");
        let (bob, mut bob_rx) = registry.connect("bob");
        registry.join(&alice, "c1");
        registry.join(&bob, "c1");

        let delivered = registry.broadcast("c1", message_event("c1", "hi"));
        assert_eq!(delivered, 2);
        assert_eq!(content_of(alice_rx.recv().await.unwrap()), "hi");
        assert_eq!(content_of(bob_rx.recv().await.unwrap()), "hi");
    }

    #[tokio::test]
    async fn unjoined_session_receives_nothing() {
        let registry = SessionRegistry::new();
        let (alice, _alice_rx) = registry.connect("alice");
        let (_bob, mut bob_rx) = registry.connect("bob");
        registry.join(&alice, "c1");

        let delivered = registry.broadcast("c1", message_event("c1", "hi"));
        assert_eq!(delivered, 1);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_targets_one_session() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = registry.connect("alice");
        let (_bob, mut bob_rx) = registry.connect("bob");

        assert!(registry.send_to(&alice, typing_event("c1", "bob")));
        assert!(alice_rx.recv().await.is_some());
        assert!(bob_rx.try_recv().is_err());
        assert!(!registry.send_to("no-such-session", typing_event("c1", "bob")));
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = registry.connect("alice");
        registry.join(&alice, "c1");
        registry.join(&alice, "c1");

        assert_eq!(registry.broadcast("c1", message_event("c1", "once")), 1);
        assert_eq!(content_of(alice_rx.recv().await.unwrap()), "once");
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn typing_broadcast_excludes_the_sender_session() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = registry.connect("alice");
        let (bob, mut bob_rx) = registry.connect("bob");
        registry.join(&alice, "c1");
        registry.join(&bob, "c1");

        let delivered = registry.broadcast_except("c1", &alice, typing_event("c1", "alice"));
        assert_eq!(delivered, 1);
        assert!(alice_rx.try_recv().is_err());
        assert!(matches!(
            bob_rx.recv().await.unwrap(),
            ServerEvent::UserTyping { user_id, .. } if user_id == "alice"
        ));
    }

    #[tokio::test]
    async fn dead_session_does_not_block_the_rest_of_the_room() {
        let registry = SessionRegistry::new();
        let (alice, alice_rx) = registry.connect("alice");
        let (bob, mut bob_rx) = registry.connect("bob");
        registry.join(&alice, "c1");
        registry.join(&bob, "c1");
        drop(alice_rx);

        let delivered = registry.broadcast("c1", message_event("c1", "still here"));
        assert_eq!(delivered, 1);
        assert_eq!(content_of(bob_rx.recv().await.unwrap()), "still here");
    }

    #[tokio::test]
    async fn events_arrive_in_broadcast_order() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = registry.connect("alice");
        registry.join(&alice, "c1");

        registry.broadcast("c1", message_event("c1", "first"));
        registry.broadcast("c1", message_event("c1", "second"));

        assert_eq!(content_of(alice_rx.recv().await.unwrap()), "first");
        assert_eq!(content_of(alice_rx.recv().await.unwrap()), "second");
    }

    #[tokio::test]
    async fn disconnect_removes_membership_and_presence() {
        let registry = SessionRegistry::new();
        let (alice, _alice_rx) = registry.connect("alice");
        registry.join(&alice, "c1");
        assert!(registry.is_online("alice"));

        registry.disconnect(&alice);
        assert!(!registry.is_online("alice"));
        assert_eq!(registry.broadcast("c1", message_event("c1", "gone")), 0);

        // A second device keeps the user online until it too disconnects.
        let (first, _rx1) = registry.connect("bob");
        let (second, _rx2) = registry.connect("bob");
        registry.disconnect(&first);
        assert!(registry.is_online("bob"));
        registry.disconnect(&second);
        assert!(!registry.is_online("bob"));
    }

    #[test]
    fn typing_notice_expires_lazily() {
        let registry = SessionRegistry::new();
        let now = Instant::now();
        registry.note_typing_at("c1", "alice", now);

        assert_eq!(
            registry.typing_user_at("c1", now + Duration::from_secs(2)),
            Some("alice".to_string())
        );
        assert_eq!(registry.typing_user_at("c1", now + Duration::from_secs(4)), None);
        // The expired entry is gone, not just masked.
        assert_eq!(registry.typing_user_at("c1", now), None);
    }

    #[test]
    fn fresh_typing_notice_replaces_the_previous_one() {
        let registry = SessionRegistry::new();
        let now = Instant::now();
        registry.note_typing_at("c1", "alice", now);
        registry.note_typing_at("c1", "bob", now + Duration::from_secs(1));

        assert_eq!(
            registry.typing_user_at("c1", now + Duration::from_secs(2)),
            Some("bob".to_string())
        );
    }

    #[test]
    fn conversation_lock_is_shared_per_conversation() {
        let registry = SessionRegistry::new();
        let a = registry.conversation_lock("c1");
        let b = registry.conversation_lock("c1");
        let other = registry.conversation_lock("c2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }
}
