//! Bearer token authentication.
//!
//! Token issuance is external; this side only verifies. HTTP requests carry
//! the token in the `Authorization` header. WebSocket clients send it in an
//! auth frame after connecting, never in the URL, so it cannot end up in
//! proxy logs or browser history.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Expiration (seconds since epoch)
    pub exp: i64,
    /// Issued at
    #[serde(default)]
    pub iat: i64,
}

/// Verifies HS256 bearer tokens against the shared signing secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Create from the `AUTH_SECRET` environment variable.
    pub fn from_env() -> Result<Self, String> {
        let secret =
            std::env::var("AUTH_SECRET").map_err(|_| "AUTH_SECRET is not set".to_string())?;
        if secret.len() < 32 {
            return Err("AUTH_SECRET must be at least 32 bytes".to_string());
        }
        Ok(Self::new(secret.as_bytes()))
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ApiError::unauthorized(format!("invalid token: {e}")))
    }
}

/// Authenticated user extracted from the request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

        let claims = state.verifier.verify(token)?;
        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret-test-secret-test-secret!";

    fn token_for(sub: &str, exp_offset_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            exp: now + exp_offset_secs,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_tokens() {
        let verifier = TokenVerifier::new(SECRET);
        let claims = verifier.verify(&token_for("user-1", 3600)).unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn rejects_expired_tokens() {
        let verifier = TokenVerifier::new(SECRET);
        assert!(verifier.verify(&token_for("user-1", -3600)).is_err());
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let verifier = TokenVerifier::new(b"another-secret-another-secret-abc!");
        assert!(verifier.verify(&token_for("user-1", 3600)).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let verifier = TokenVerifier::new(SECRET);
        assert!(verifier.verify("not-a-token").is_err());
    }
}
