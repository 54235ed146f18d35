use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Domain records ───────────────────────────────────────────────────────────

/// Full user row. The password hash never leaves the database/service layers;
/// everything client-facing goes through [`PublicUser`] or [`ProfileView`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: String,
    pub skills_have: Vec<String>,
    pub skills_want: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            profile_picture: String::new(),
            skills_have: Vec::new(),
            skills_want: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A pairwise conversation. The participant pair is stored normalized
/// (`participant_low < participant_high`) so each unordered pair maps to at
/// most one row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    pub id: String,
    pub participant_low: String,
    pub participant_high: String,
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_low == user_id || self.participant_high == user_id
    }
}

// ── Client-facing projections ────────────────────────────────────────────────

/// Display-safe user projection embedded in chat payloads and broadcasts:
/// id, name, email and picture only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_picture: String,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            profile_picture: u.profile_picture.clone(),
        }
    }
}

/// Profile projection: the public fields plus both skill lists. Also the
/// shape of a user-directory entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_picture: String,
    pub skills_have: Vec<String>,
    pub skills_want: Vec<String>,
}

impl From<&User> for ProfileView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            profile_picture: u.profile_picture.clone(),
            skills_have: u.skills_have.clone(),
            skills_want: u.skills_want.clone(),
        }
    }
}

/// A message as clients see it: sender resolved to the public projection,
/// timestamp assigned by the persistence boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: PublicUser,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Conversation-list entry: participants populated, ordered by recency.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub participants: Vec<PublicUser>,
    pub last_message: DateTime<Utc>,
}

/// One conversation with a paginated message window. `has_more` tells the
/// client whether older history remains before the window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    #[serde(rename = "_id")]
    pub id: String,
    pub participants: Vec<PublicUser>,
    pub messages: Vec<MessageView>,
    pub last_message: DateTime<Utc>,
    pub has_more: bool,
}

// ── HTTP request/response bodies ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: ProfileView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub skills_have: Option<Vec<String>>,
    pub skills_want: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub participant_id: String,
}

/// Query half of the history pagination contract: `limit` most-recent
/// messages after skipping `skip` from the end of the log.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

// ── Socket events ────────────────────────────────────────────────────────────

/// Client→server socket events, `type`-tagged JSON text frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinChat { chat_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage { chat_id: String, content: String },
    #[serde(rename_all = "camelCase")]
    Typing { chat_id: String },
}

/// Server→client socket events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    NewMessage { chat_id: String, message: MessageView },
    #[serde(rename_all = "camelCase")]
    UserTyping { chat_id: String, user_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> MessageView {
        MessageView {
            id: "m1".into(),
            sender: PublicUser {
                id: "u1".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
                profile_picture: String::new(),
            },
            content: "hello".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_message_wire_shape() {
        let event = ServerEvent::NewMessage {
            chat_id: "c1".into(),
            message: sample_message(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "new_message");
        assert_eq!(json["chatId"], "c1");
        assert_eq!(json["message"]["_id"], "m1");
        assert_eq!(json["message"]["sender"]["_id"], "u1");
        assert_eq!(json["message"]["sender"]["profilePicture"], "");
        assert!(json["message"]["timestamp"].is_string());
    }

    #[test]
    fn user_typing_wire_shape() {
        let event = ServerEvent::UserTyping {
            chat_id: "c1".into(),
            user_id: "u2".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user_typing");
        assert_eq!(json["chatId"], "c1");
        assert_eq!(json["userId"], "u2");
    }

    #[test]
    fn client_events_parse_from_camel_case_frames() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"type":"join_chat","chatId":"c1"}"#).unwrap();
        assert!(matches!(join, ClientEvent::JoinChat { chat_id } if chat_id == "c1"));

        let send: ClientEvent =
            serde_json::from_str(r#"{"type":"send_message","chatId":"c1","content":"hi"}"#)
                .unwrap();
        assert!(
            matches!(send, ClientEvent::SendMessage { chat_id, content } if chat_id == "c1" && content == "hi")
        );

        let typing: ClientEvent =
            serde_json::from_str(r#"{"type":"typing","chatId":"c1"}"#).unwrap();
        assert!(matches!(typing, ClientEvent::Typing { chat_id } if chat_id == "c1"));
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let parsed: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"shout","chatId":"c1"}"#);
        assert!(parsed.is_err());
    }
}
