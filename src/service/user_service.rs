use crate::db::user_repository::UserRepository;
use crate::errors::AppError;
use crate::models::{ProfileView, UpdateProfileRequest, User};

#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
}

impl UserService {
    pub fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// Creates an account with a bcrypt-hashed password.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() {
            return Err(AppError::EmptyField { field_name: "name".to_string() });
        }
        if email.is_empty() {
            return Err(AppError::EmptyField { field_name: "email".to_string() });
        }
        if password.is_empty() {
            return Err(AppError::EmptyField { field_name: "password".to_string() });
        }

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Unexpected(format!("Failed to hash password: {e}")))?;

        let user = User::new(name.to_string(), email, password_hash);
        self.user_repo.insert(&user).await?;
        Ok(user)
    }

    /// Verifies credentials. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.user_repo.find_by_email(&email).await? else {
            return Err(AppError::InvalidCredentials);
        };
        let matches = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| AppError::Unexpected(format!("Failed to verify password: {e}")))?;
        if !matches {
            return Err(AppError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.user_repo.find_by_id(id).await
    }

    /// Partial profile update; absent fields are untouched.
    pub async fn update_profile(
        &self,
        user_id: &str,
        update: UpdateProfileRequest,
    ) -> Result<User, AppError> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(AppError::EmptyField { field_name: "name".to_string() });
            }
        }
        self.user_repo
            .update_profile(user_id, &update)
            .await?
            .ok_or_else(|| AppError::UserNotFound { id: user_id.to_string() })
    }

    /// Directory of every other user, for the matching screens.
    pub async fn list_others(&self, user_id: &str) -> Result<Vec<ProfileView>, AppError> {
        let users = self.user_repo.list_others(user_id).await?;
        Ok(users.iter().map(ProfileView::from).collect())
    }
}
