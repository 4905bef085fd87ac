//! Bearer-token authentication and password hashing.
//!
//! The portal issues its own HS256 tokens: admin logins carry an `admin`
//! role claim, participant logins a `participant` role claim. Tokens expire
//! after the configured lifetime (8 hours by default). Passwords are stored
//! as argon2id PHC strings.

use crate::errors::AppError;
use anyhow::anyhow;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hashes a password with argon2id, returning the PHC-formatted string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(anyhow!("Failed to hash password: {}", e)))
}

/// Verifies a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::InternalServerError(anyhow!("Invalid stored hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    Admin,
    Participant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: TokenRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matric_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and verification keys plus the token lifetime.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AuthKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        AuthKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue_admin_token(&self, admin_id: i64, username: &str) -> Result<String, AppError> {
        self.issue(Claims {
            sub: admin_id,
            role: TokenRole::Admin,
            username: Some(username.to_string()),
            matric_number: None,
            cohort_id: None,
            iat: 0,
            exp: 0,
        })
    }

    pub fn issue_participant_token(
        &self,
        participant_id: i64,
        matric_number: &str,
        cohort_id: i64,
    ) -> Result<String, AppError> {
        self.issue(Claims {
            sub: participant_id,
            role: TokenRole::Participant,
            username: None,
            matric_number: Some(matric_number.to_string()),
            cohort_id: Some(cohort_id),
            iat: 0,
            exp: 0,
        })
    }

    fn issue(&self, mut claims: Claims) -> Result<String, AppError> {
        let now = Utc::now();
        claims.iat = now.timestamp();
        claims.exp = (now + self.ttl).timestamp();

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(anyhow!("Failed to sign token: {}", e)))
    }

    /// Decodes and validates a bearer token, including its expiry.
    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("Rejected bearer token: {}", e);
                AppError::Forbidden("Invalid or expired token".to_string())
            })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))
}

/// Identity of the admin resolved from the bearer token on admin routes.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub id: i64,
    pub username: String,
}

impl<S> FromRequestParts<S> for AdminIdentity
where
    AuthKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = AuthKeys::from_ref(state);
        let claims = keys.decode_token(bearer_token(parts)?)?;

        if claims.role != TokenRole::Admin {
            warn!("Non-admin token presented on an admin route");
            return Err(AppError::Forbidden(
                "Administrator credentials required".to_string(),
            ));
        }

        Ok(AdminIdentity {
            id: claims.sub,
            username: claims.username.unwrap_or_default(),
        })
    }
}

/// Identity of the participant resolved from the bearer token on user routes.
#[derive(Debug, Clone)]
pub struct ParticipantIdentity {
    pub id: i64,
}

impl<S> FromRequestParts<S> for ParticipantIdentity
where
    AuthKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = AuthKeys::from_ref(state);
        let claims = keys.decode_token(bearer_token(parts)?)?;

        if claims.role != TokenRole::Participant {
            warn!("Non-participant token presented on a participant route");
            return Err(AppError::Forbidden(
                "Participant credentials required".to_string(),
            ));
        }

        Ok(ParticipantIdentity { id: claims.sub })
    }
}
