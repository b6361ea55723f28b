use crate::{
    error::{AppError, AppResult},
    models::Role,
};
use argon2::Argon2;
use axum::{
    async_trait,
    extract::{FromRequest, RequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    http::StatusCode,
    Extension,
};
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

/// Signing keys and token lifetime, shared with handlers as an `Extension<Arc<Keys>>`.
pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Keys {
    /// Builds keys from a base64 secret.
    pub fn from_base64_secret(secret: &str, ttl: Duration) -> JwtResult<Keys> {
        Ok(Keys {
            encoding: EncodingKey::from_base64_secret(secret)?,
            decoding: DecodingKey::from_base64_secret(secret)?,
            ttl,
        })
    }

    pub fn generate_jwt(&self, profile_id: i32, role: Role) -> JwtResult<String> {
        jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                sub: profile_id,
                role,
                exp: jsonwebtoken::get_current_timestamp() + self.ttl.as_secs(),
            },
            &self.encoding,
        )
    }

    pub fn validate_jwt(&self, token: &str) -> JwtResult<TokenData<Claims>> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub role: Role,
    pub exp: u64,
}

/// The signed-in caller, taken from the `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, role: Role) -> AppResult<()> {
        crate::policy::require_role(self.role, role)
    }
}

#[async_trait]
impl<B: Send> FromRequest<B> for AuthUser {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| AppError::from(StatusCode::UNAUTHORIZED, "missing bearer token"))?;

        let Extension(keys) = Extension::<Arc<Keys>>::from_request(req)
            .await
            .map_err(|e| anyhow::anyhow!("signing keys are not installed: {e}"))?;

        let claims = keys
            .validate_jwt(bearer.token())
            .map_err(|_| AppError::from(StatusCode::UNAUTHORIZED, "invalid or expired token"))?
            .claims;

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

/// Like [`AuthUser`], but anonymous requests are let through as `None`.
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl<B: Send> FromRequest<B> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        if req.headers().get(axum::http::header::AUTHORIZATION).is_none() {
            return Ok(MaybeAuthUser(None));
        }
        AuthUser::from_request(req).await.map(|u| MaybeAuthUser(Some(u)))
    }
}
