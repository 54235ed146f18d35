use axum::extract::State;
use axum::Json;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{ProfileView, UpdateProfileRequest};
use crate::AppState;

/// GET `/api/users/profile` — the caller's profile.
pub async fn get_profile_handler(AuthUser(user): AuthUser) -> Json<ProfileView> {
    Json(ProfileView::from(&user))
}

/// PUT `/api/users/profile` — partial update; absent fields are untouched.
pub async fn update_profile_handler(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(update): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileView>, AppError> {
    let updated = state.users.update_profile(&user.id, update).await?;
    Ok(Json(ProfileView::from(&updated)))
}

/// GET `/api/users` — every other user, for the matching screens.
pub async fn list_users_handler(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfileView>>, AppError> {
    Ok(Json(state.users.list_others(&user.id).await?))
}
