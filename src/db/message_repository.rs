use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{MessageView, PublicUser};

/// Index window over a log of `total` messages: covers
/// `[max(0, total - skip - limit), max(0, total - skip))` in chronological
/// order. The flag reports whether older history remains before the window.
pub fn window_bounds(total: i64, skip: i64, limit: i64) -> (i64, i64, bool) {
    let end = (total - skip).max(0);
    let start = (total - skip - limit).max(0);
    (start, end, start > 0)
}

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one message and bumps the conversation's `last_message_at` in
    /// a single transaction. The conversation row is locked first, so appends
    /// to one conversation are serialized and the server-assigned timestamps
    /// are monotone in append order. Nothing persists on failure.
    pub async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<MessageView, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin append transaction for {conversation_id}: {e}");
            AppError::db_query("Failed to begin transaction", e)
        })?;

        let conversation = sqlx::query(
            "SELECT participant_low, participant_high FROM conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to lock conversation {conversation_id}: {e}");
            AppError::db_query("Failed to lock conversation", e)
        })?;

        let Some(conversation) = conversation else {
            return Err(AppError::ConversationNotFound { id: conversation_id.to_string() });
        };
        let low: String = conversation
            .try_get("participant_low")
            .map_err(|e| AppError::db_query("Failed to read participant_low", e))?;
        let high: String = conversation
            .try_get("participant_high")
            .map_err(|e| AppError::db_query("Failed to read participant_high", e))?;
        if sender_id != low && sender_id != high {
            return Err(AppError::NotAParticipant { chat_id: conversation_id.to_string() });
        }

        let message_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&message_id)
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .bind(timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to insert message in {conversation_id}: {e}");
            AppError::db_query("Failed to insert message", e)
        })?;

        sqlx::query("UPDATE conversations SET last_message_at = $1 WHERE id = $2")
            .bind(timestamp)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to bump last_message_at for {conversation_id}: {e}");
                AppError::db_query("Failed to update conversation", e)
            })?;

        let sender = sqlx::query(
            "SELECT id, name, email, profile_picture FROM users WHERE id = $1",
        )
        .bind(sender_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to resolve sender {sender_id}: {e}");
            AppError::db_query("Failed to resolve sender", e)
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit append for {conversation_id}: {e}");
            AppError::db_query("Failed to commit append", e)
        })?;

        Ok(MessageView {
            id: message_id,
            sender: PublicUser {
                id: sender
                    .try_get("id")
                    .map_err(|e| AppError::db_query("Failed to read sender id", e))?,
                name: sender
                    .try_get("name")
                    .map_err(|e| AppError::db_query("Failed to read sender name", e))?,
                email: sender
                    .try_get("email")
                    .map_err(|e| AppError::db_query("Failed to read sender email", e))?,
                profile_picture: sender
                    .try_get("profile_picture")
                    .map_err(|e| AppError::db_query("Failed to read sender picture", e))?,
            },
            content: content.to_string(),
            timestamp,
        })
    }

    pub async fn count_for_conversation(&self, conversation_id: &str) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to count messages for {conversation_id}: {e}");
                AppError::db_query("Failed to count messages", e)
            })
    }

    /// Chronological slice of a conversation's log starting at append index
    /// `start`, senders resolved to display-safe projections.
    pub async fn fetch_window(
        &self,
        conversation_id: &str,
        start: i64,
        len: i64,
    ) -> Result<Vec<MessageView>, AppError> {
        let rows = sqlx::query(
            "SELECT m.id, m.content, m.created_at,
                    u.id AS sender_id, u.name, u.email, u.profile_picture
             FROM messages m
             JOIN users u ON u.id = m.sender_id
             WHERE m.conversation_id = $1
             ORDER BY m.seq ASC
             LIMIT $2 OFFSET $3",
        )
        .bind(conversation_id)
        .bind(len)
        .bind(start)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch messages for {conversation_id}: {e}");
            AppError::db_query(
                format!("Failed to fetch messages for {conversation_id}"),
                e,
            )
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(MessageView {
                    id: row
                        .try_get("id")
                        .map_err(|e| AppError::db_query("Failed to read id", e))?,
                    sender: PublicUser {
                        id: row
                            .try_get("sender_id")
                            .map_err(|e| AppError::db_query("Failed to read sender_id", e))?,
                        name: row
                            .try_get("name")
                            .map_err(|e| AppError::db_query("Failed to read name", e))?,
                        email: row
                            .try_get("email")
                            .map_err(|e| AppError::db_query("Failed to read email", e))?,
                        profile_picture: row
                            .try_get("profile_picture")
                            .map_err(|e| AppError::db_query("Failed to read profile_picture", e))?,
                    },
                    content: row
                        .try_get("content")
                        .map_err(|e| AppError::db_query("Failed to read content", e))?,
                    timestamp: row
                        .try_get("created_at")
                        .map_err(|e| AppError::db_query("Failed to read created_at", e))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The canonical 120-message log: skip pages backward from the end,
    // windows come back in chronological order.
    #[test]
    fn window_pages_backward_through_a_120_message_log() {
        // Most recent 50: indices 70..120 (messages 71-120, 1-indexed).
        assert_eq!(window_bounds(120, 0, 50), (70, 120, true));
        // One page back: indices 20..70 (messages 21-70).
        assert_eq!(window_bounds(120, 50, 50), (20, 70, true));
        // Oldest partial page: indices 0..20 (messages 1-20), nothing older.
        assert_eq!(window_bounds(120, 100, 50), (0, 20, false));
    }

    #[test]
    fn window_of_short_log_is_the_whole_log() {
        assert_eq!(window_bounds(10, 0, 50), (0, 10, false));
    }

    #[test]
    fn window_of_empty_log_is_empty() {
        assert_eq!(window_bounds(0, 0, 50), (0, 0, false));
    }

    #[test]
    fn skip_past_the_start_yields_an_empty_window() {
        assert_eq!(window_bounds(10, 50, 50), (0, 0, false));
    }

    #[test]
    fn window_exactly_covering_the_log_reports_no_more() {
        assert_eq!(window_bounds(50, 0, 50), (0, 50, false));
        assert_eq!(window_bounds(51, 0, 50), (1, 51, true));
    }
}
