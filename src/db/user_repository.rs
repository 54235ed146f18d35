use sqlx::PgPool;
use tracing::error;

use crate::errors::AppError;
use crate::models::{UpdateProfileRequest, User};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, profile_picture, skills_have, skills_want, created_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, profile_picture, skills_have, skills_want, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.profile_picture)
        .bind(&user.skills_have)
        .bind(&user.skills_want)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.constraint() == Some("users_email_key") {
                    return AppError::EmailAlreadyRegistered { email: user.email.clone() };
                }
            }
            error!("Failed to insert user {}: {e}", user.id);
            AppError::db_query("Failed to insert user", e)
        })?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to find user {id}: {e}");
                AppError::db_query(format!("Failed to find user {id}"), e)
            })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to find user by email: {e}");
                AppError::db_query("Failed to find user by email", e)
            })
    }

    /// Partial profile update: NULL binds leave the column untouched.
    pub async fn update_profile(
        &self,
        id: &str,
        update: &UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET name = COALESCE($2, name),
                 profile_picture = COALESCE($3, profile_picture),
                 skills_have = COALESCE($4, skills_have),
                 skills_want = COALESCE($5, skills_want)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.profile_picture)
        .bind(&update.skills_have)
        .bind(&update.skills_want)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update profile for {id}: {e}");
            AppError::db_query("Failed to update profile", e)
        })
    }

    /// Every user except the given one, for the directory listing.
    pub async fn list_others(&self, user_id: &str) -> Result<Vec<User>, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id <> $1 ORDER BY name"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list users: {e}");
            AppError::db_query("Failed to list users", e)
        })
    }
}
