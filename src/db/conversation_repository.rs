use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{ChatSummary, Conversation, PublicUser};

/// Normalizes an unordered participant pair to the stored (low, high) form.
pub fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the conversation for the unordered pair, creating it if none
    /// exists. The pair uniqueness constraint makes concurrent first contacts
    /// converge on a single row.
    pub async fn find_or_create(&self, a: &str, b: &str) -> Result<Conversation, AppError> {
        let (low, high) = ordered_pair(a, b);

        sqlx::query(
            "INSERT INTO conversations (id, participant_low, participant_high)
             VALUES ($1, $2, $3)
             ON CONFLICT (participant_low, participant_high) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(low)
        .bind(high)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create conversation for ({low}, {high}): {e}");
            AppError::db_query("Failed to create conversation", e)
        })?;

        sqlx::query_as::<_, Conversation>(
            "SELECT id, participant_low, participant_high, last_message_at
             FROM conversations WHERE participant_low = $1 AND participant_high = $2",
        )
        .bind(low)
        .bind(high)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to read back conversation for ({low}, {high}): {e}");
            AppError::db_query("Failed to read back conversation", e)
        })
    }

    /// The conversation plus both participants resolved to display-safe
    /// projections.
    pub async fn find_with_participants(
        &self,
        id: &str,
    ) -> Result<Option<(Conversation, Vec<PublicUser>)>, AppError> {
        let row = sqlx::query(
            "SELECT c.id, c.participant_low, c.participant_high, c.last_message_at,
                    ua.id AS a_id, ua.name AS a_name, ua.email AS a_email, ua.profile_picture AS a_picture,
                    ub.id AS b_id, ub.name AS b_name, ub.email AS b_email, ub.profile_picture AS b_picture
             FROM conversations c
             JOIN users ua ON ua.id = c.participant_low
             JOIN users ub ON ub.id = c.participant_high
             WHERE c.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load conversation {id}: {e}");
            AppError::db_query(format!("Failed to load conversation {id}"), e)
        })?;

        row.map(|row| {
            let conversation = Conversation {
                id: get(&row, "id")?,
                participant_low: get(&row, "participant_low")?,
                participant_high: get(&row, "participant_high")?,
                last_message_at: row
                    .try_get("last_message_at")
                    .map_err(|e| AppError::db_query("Failed to read last_message_at", e))?,
            };
            let participants = vec![participant(&row, "a")?, participant(&row, "b")?];
            Ok((conversation, participants))
        })
        .transpose()
    }

    /// All conversations containing the user, most recently active first,
    /// participants resolved.
    pub async fn list_with_participants(
        &self,
        user_id: &str,
    ) -> Result<Vec<ChatSummary>, AppError> {
        let rows = sqlx::query(
            "SELECT c.id, c.last_message_at,
                    ua.id AS a_id, ua.name AS a_name, ua.email AS a_email, ua.profile_picture AS a_picture,
                    ub.id AS b_id, ub.name AS b_name, ub.email AS b_email, ub.profile_picture AS b_picture
             FROM conversations c
             JOIN users ua ON ua.id = c.participant_low
             JOIN users ub ON ub.id = c.participant_high
             WHERE c.participant_low = $1 OR c.participant_high = $1
             ORDER BY c.last_message_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list conversations for {user_id}: {e}");
            AppError::db_query("Failed to list conversations", e)
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(ChatSummary {
                    id: get(&row, "id")?,
                    participants: vec![participant(&row, "a")?, participant(&row, "b")?],
                    last_message: row
                        .try_get("last_message_at")
                        .map_err(|e| AppError::db_query("Failed to read last_message_at", e))?,
                })
            })
            .collect()
    }
}

fn get(row: &PgRow, column: &str) -> Result<String, AppError> {
    row.try_get(column)
        .map_err(|e| AppError::db_query(format!("Failed to read {column}"), e))
}

fn participant(row: &PgRow, prefix: &str) -> Result<PublicUser, AppError> {
    Ok(PublicUser {
        id: get(row, &format!("{prefix}_id"))?,
        name: get(row, &format!("{prefix}_name"))?,
        email: get(row, &format!("{prefix}_email"))?,
        profile_picture: get(row, &format!("{prefix}_picture"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_is_order_insensitive() {
        assert_eq!(ordered_pair("alice", "bob"), ("alice", "bob"));
        assert_eq!(ordered_pair("bob", "alice"), ("alice", "bob"));
    }

    #[test]
    fn ordered_pair_keeps_equal_ids_in_place() {
        assert_eq!(ordered_pair("alice", "alice"), ("alice", "alice"));
    }
}
