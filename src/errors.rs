use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Top-level application error. All variants carry a human-readable message
/// for display/logging; the `IntoResponse` impl maps them onto the HTTP
/// surface.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Authentication ───────────────────────────────────────────────────────
    #[error("Authentication error")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email '{email}' is already registered")]
    EmailAlreadyRegistered { email: String },

    // ── Authorization ────────────────────────────────────────────────────────
    #[error("Not authorized to access chat '{chat_id}'")]
    NotAParticipant { chat_id: String },

    // ── Not found ────────────────────────────────────────────────────────────
    #[error("Chat '{id}' not found")]
    ConversationNotFound { id: String },

    #[error("User '{id}' not found")]
    UserNotFound { id: String },

    // ── Validation ───────────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong {
        field_name: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("Cannot start a chat with yourself")]
    SelfConversation,

    // ── Database errors ──────────────────────────────────────────────────────
    #[error("Database query failed: {message}")]
    DatabaseQueryFailed {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn db_query(message: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::DatabaseQueryFailed { message: message.into(), source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::ConversationNotFound { .. } | AppError::UserNotFound { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::EmptyField { .. }
                | AppError::FieldTooLong { .. }
                | AppError::SelfConversation
                | AppError::EmailAlreadyRegistered { .. }
        )
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AppError::Unauthenticated | AppError::InvalidCredentials)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, AppError::NotAParticipant { .. })
    }

    fn status(&self) -> StatusCode {
        if self.is_unauthenticated() {
            StatusCode::UNAUTHORIZED
        } else if self.is_forbidden() {
            StatusCode::FORBIDDEN
        } else if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal failure details stay in the logs; clients get the generic
        // variant message only.
        let body = Json(serde_json::json!({ "message": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::NotAParticipant { chat_id: "c1".into() }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::ConversationNotFound { id: "c1".into() }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::EmptyField { field_name: "content".into() }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unexpected("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
