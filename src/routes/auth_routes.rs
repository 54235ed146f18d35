use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::errors::AppError;
use crate::models::{AuthResponse, LoginRequest, ProfileView, RegisterRequest};
use crate::AppState;

/// POST `/api/auth/register` — create an account and issue a bearer token.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = state.users.register(&req.name, &req.email, &req.password).await?;
    let token = state.auth.issue(&user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse { token, user: ProfileView::from(&user) }),
    ))
}

/// POST `/api/auth/login` — verify credentials and issue a bearer token.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state.users.login(&req.email, &req.password).await?;
    let token = state.auth.issue(&user.id)?;
    Ok(Json(AuthResponse { token, user: ProfileView::from(&user) }))
}
