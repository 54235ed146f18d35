use crate::db::conversation_repository::ConversationRepository;
use crate::db::message_repository::{window_bounds, MessageRepository};
use crate::db::user_repository::UserRepository;
use crate::errors::AppError;
use crate::models::{ChatSummary, ChatView, MessageView};

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
const MAX_MESSAGE_LENGTH: usize = 8000;

/// Rejects empty-after-trim and oversized message content, returning the
/// trimmed text that gets persisted.
pub fn validate_content(content: &str) -> Result<&str, AppError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::EmptyField { field_name: "content".to_string() });
    }
    if trimmed.len() > MAX_MESSAGE_LENGTH {
        return Err(AppError::FieldTooLong {
            field_name: "content".to_string(),
            max_length: MAX_MESSAGE_LENGTH,
            actual_length: trimmed.len(),
        });
    }
    Ok(trimmed)
}

#[derive(Clone)]
pub struct ChatService {
    conversation_repo: ConversationRepository,
    message_repo: MessageRepository,
    user_repo: UserRepository,
}

impl ChatService {
    pub fn new(
        conversation_repo: ConversationRepository,
        message_repo: MessageRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self { conversation_repo, message_repo, user_repo }
    }

    /// All of the caller's conversations, most recently active first.
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<ChatSummary>, AppError> {
        self.conversation_repo.list_with_participants(user_id).await
    }

    /// One conversation with a message window taken from the end of the log.
    /// `skip = 0` is the most recent `limit` messages; larger `skip` pages
    /// backward. Only participants may read.
    pub async fn get_conversation(
        &self,
        chat_id: &str,
        requester_id: &str,
        limit: Option<i64>,
        skip: Option<i64>,
    ) -> Result<ChatView, AppError> {
        let (conversation, participants) = self
            .conversation_repo
            .find_with_participants(chat_id)
            .await?
            .ok_or_else(|| AppError::ConversationNotFound { id: chat_id.to_string() })?;

        if !conversation.has_participant(requester_id) {
            return Err(AppError::NotAParticipant { chat_id: chat_id.to_string() });
        }

        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
        let skip = skip.unwrap_or(0).max(0);

        let total = self.message_repo.count_for_conversation(chat_id).await?;
        let (start, end, has_more) = window_bounds(total, skip, limit);
        let messages = if end > start {
            self.message_repo.fetch_window(chat_id, start, end - start).await?
        } else {
            Vec::new()
        };

        Ok(ChatView {
            id: conversation.id,
            participants,
            messages,
            last_message: conversation.last_message_at,
            has_more,
        })
    }

    /// Find-or-create the conversation between the caller and `participant_id`.
    pub async fn start_conversation(
        &self,
        user_id: &str,
        participant_id: &str,
    ) -> Result<ChatView, AppError> {
        if participant_id == user_id {
            return Err(AppError::SelfConversation);
        }
        self.user_repo
            .find_by_id(participant_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound { id: participant_id.to_string() })?;

        let conversation = self.conversation_repo.find_or_create(user_id, participant_id).await?;
        self.get_conversation(&conversation.id, user_id, None, None).await
    }

    /// Validates and appends one message, returning the broadcast-ready view.
    /// Persistence does not depend on the sender's room membership.
    pub async fn append_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<MessageView, AppError> {
        let content = validate_content(content)?;
        self.message_repo.append(chat_id, sender_id, content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_content_is_rejected() {
        assert!(matches!(
            validate_content("   \t\n  "),
            Err(AppError::EmptyField { .. })
        ));
        assert!(matches!(validate_content(""), Err(AppError::EmptyField { .. })));
    }

    #[test]
    fn content_is_trimmed_before_persistence() {
        assert_eq!(validate_content("  hello  ").unwrap(), "hello");
    }

    #[test]
    fn oversized_content_is_rejected() {
        let content = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(
            validate_content(&content),
            Err(AppError::FieldTooLong { .. })
        ));
    }
}
