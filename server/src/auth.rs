// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Identity resolution and the authorization guard.
//!
//! Callers authenticate with `Authorization: Bearer <token>`. Tokens are
//! random and shown once when a user is provisioned; the database only keeps
//! their SHA-256 digest, and resolution looks the digest up.

use crate::database;
use crate::error::{ServiceError, ServiceResult};
use crate::handlers::AppError;
use anyhow::Result;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use common::Identity;
use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

const BEARER_SCHEME: &str = "Bearer";

/// Hex-encoded SHA-256 digest of an API token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A fresh 128-bit random API token.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Creates a user and returns it together with its plain-text token.
/// The token cannot be recovered later.
pub async fn provision_user(
    conn: &mut SqliteConnection,
    username: &str,
    is_admin: bool,
) -> Result<(Identity, String)> {
    let token = generate_token();
    let identity = database::insert_user(conn, username, is_admin, &hash_token(&token)).await?;
    info!(
        "Provisioned user '{}' with ID {} (admin: {}).",
        identity.username, identity.user_id, identity.is_admin
    );
    Ok((identity, token))
}

/// Extracts the token of a well-formed `Authorization: Bearer` header.
/// The scheme name is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let (scheme, token) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?
        .split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(BEARER_SCHEME) && !token.is_empty()).then_some(token)
}

/// Resolves the presented token into an identity.
pub async fn resolve_identity(
    conn: &mut SqliteConnection,
    bearer: Option<&str>,
) -> ServiceResult<Identity> {
    let Some(token) = bearer else {
        debug!("Request carries no bearer token.");
        return Err(ServiceError::Unauthenticated);
    };

    match database::find_user_by_token_hash(conn, &hash_token(token)).await? {
        Some(identity) => {
            debug!("Resolved identity {}.", identity.user_id);
            Ok(identity)
        }
        None => {
            warn!("Rejected an unknown bearer token.");
            Err(ServiceError::Unauthenticated)
        }
    }
}

/// Any resolved identity may act as a plain user.
pub fn require_user(identity: Identity) -> Identity {
    identity
}

pub fn require_admin(identity: Identity) -> ServiceResult<Identity> {
    if identity.is_admin {
        Ok(identity)
    } else {
        warn!("User {} attempted an admin-only operation.", identity.user_id);
        Err(ServiceError::Forbidden)
    }
}

/// Extractor yielding the caller's identity, or rejecting with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);
        let mut conn = pool.acquire().await.map_err(ServiceError::from)?;
        let identity = resolve_identity(&mut conn, bearer_token(&parts.headers)).await?;
        Ok(Self(require_user(identity)))
    }
}

/// Extractor yielding an administrator's identity: 401 when unresolved,
/// 403 when resolved without the administrator flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl<S> FromRequestParts<S> for AdminUser
where
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;
        Ok(Self(require_admin(identity)?))
    }
}
