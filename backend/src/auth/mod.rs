use std::sync::Arc;

use axum::{
    Json, async_trait,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use crates::domain::value_objects::class_payments::PayingUser;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: String,
    pub role: String,
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

/// HS256 secret shared with Supabase; installed on the router as an `Extension`.
#[derive(Debug, Clone)]
pub struct JwtSecret(pub String);

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: String,
    pub metadata: Value,
}

impl AuthUser {
    pub fn full_name(&self) -> Option<String> {
        ["full_name", "name"]
            .iter()
            .filter_map(|key| self.metadata.get(key).and_then(Value::as_str))
            .map(str::trim)
            .find(|name| !name.is_empty())
            .map(str::to_string)
    }
}

impl From<&AuthUser> for PayingUser {
    fn from(value: &AuthUser) -> Self {
        Self {
            user_id: value.user_id,
            email: value.email.clone(),
            full_name: value.full_name(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingToken,
    #[error("Invalid Authorization header format")]
    InvalidHeader,
    #[error("JWT validation failed: {0}")]
    InvalidToken(String),
    #[error("Invalid user ID in token")]
    InvalidSubject,
    #[error("Authentication is not configured")]
    NotConfigured,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };

        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

pub fn validate_supabase_jwt(token: &str, secret: &str) -> Result<SupabaseClaims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    let token_data = decode::<SupabaseClaims>(token, &decoding_key, &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secret = parts
            .extensions
            .get::<Arc<JwtSecret>>()
            .cloned()
            .ok_or(AuthError::NotConfigured)?;

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| {
                    if rejection.is_missing() {
                        AuthError::MissingToken
                    } else {
                        AuthError::InvalidHeader
                    }
                })?;

        let claims = validate_supabase_jwt(bearer.token(), &secret.0)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)?;

        Ok(AuthUser {
            user_id,
            email: claims
                .email
                .map(|email| email.trim().to_lowercase())
                .filter(|email| !email.is_empty()),
            role: claims.role,
            metadata: claims.user_metadata,
        })
    }
}
