use std::sync::LazyLock;

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;
use http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

static KEYS: LazyLock<Keys> = LazyLock::new(|| {
    let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    Keys::new(&secret)
});

const COMPANY: &str = "aomail.ai";

pub const LONG_TTL: usize = 24 * 60 * 60; // 24 hours

#[cfg(debug_assertions)]
pub fn generate_dev_token(user_id: i32, email: &str) -> Result<String, AuthError> {
    let claims = Claims::new(user_id, email, LONG_TTL);
    encode(&claims)
}

#[cfg(debug_assertions)]
fn encode(claims: &Claims) -> Result<String, AuthError> {
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &KEYS.encoding)
        .map_err(|_| AuthError::TokenCreation)
}

fn decode(token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    validation.leeway = 10 * 60; // 10 minute leeway for expired tokens

    jsonwebtoken::decode::<Claims>(token, &KEYS.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::error!("Error decoding token: {:?}", e);
            AuthError::InvalidToken
        })
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &str) -> Self {
        let decoded_secret = hex::decode(secret).expect("Secret was not valid hex");
        Self {
            encoding: EncodingKey::from_secret(&decoded_secret),
            decoding: DecodingKey::from_secret(&decoded_secret),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub sub: i32,
    pub email: String,
    pub company: String,
    pub exp: usize,
}

impl Claims {
    pub fn new(user_id: i32, email: &str, ttl: usize) -> Self {
        Self {
            sub: user_id,
            email: email.to_string(),
            company: COMPANY.to_string(),
            exp: Utc::now().timestamp() as usize + ttl,
        }
    }
}

#[derive(Debug)]
pub(crate) enum AuthError {
    MissingCredentials,
    TokenCreation,
    InvalidToken,
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::MissingCredentials)?;

        Ok(decode(bearer.token())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let (mut parts, _) = http::Request::builder()
            .uri("/knowledge/tree")
            .body(())
            .unwrap()
            .into_parts();

        let result = Claims::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_claims_expiry_in_future() {
        let claims = Claims::new(7, "user@aomail.ai", LONG_TTL);
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.company, COMPANY);
        assert!(claims.exp > Utc::now().timestamp() as usize);
    }
}
