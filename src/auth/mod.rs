use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::User;
use crate::AppState;

const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// Signs and verifies the opaque bearer credential. Used identically to gate
/// HTTP requests and the socket handshake.
#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, AppError> {
        let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize;
        let claims = Claims { sub: user_id.to_string(), exp };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Unexpected(format!("Failed to sign token: {e}")))
    }

    /// Resolves a bearer token to the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<String, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|_| AppError::Unauthenticated)
    }
}

/// Extractor gating HTTP handlers: reads `Authorization: Bearer …`, verifies
/// the token and loads the user row. Either failure rejects with 401.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthenticated)?;

        let user_id = state.auth.verify(token)?;
        let user = state
            .users
            .find_by_id(&user_id)
            .await?
            .ok_or(AppError::Unauthenticated)?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let auth = AuthService::new("test-secret");
        let token = auth.issue("user-42").unwrap();
        assert_eq!(auth.verify(&token).unwrap(), "user-42");
    }

    #[test]
    fn garbage_token_is_unauthenticated() {
        let auth = AuthService::new("test-secret");
        assert!(matches!(
            auth.verify("not-a-token"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let issuer = AuthService::new("secret-a");
        let verifier = AuthService::new("secret-b");
        let token = issuer.issue("user-42").unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(AppError::Unauthenticated)
        ));
    }
}
