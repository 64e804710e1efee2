//! Authentication: password hashing, session tokens, and the `AuthUser` extractor.

pub mod handlers;
pub mod password;
pub mod reset;
pub mod token;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use redis::aio::MultiplexedConnection;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::{AccountKind, Party};
use crate::state::AppState;
use token::Claims;

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Logged-out token ids, kept in redis until the token would have expired anyway.
#[derive(Clone)]
pub struct Revocations {
    conn: MultiplexedConnection,
}

impl Revocations {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    fn key(jti: Uuid) -> String {
        format!("revoked:{jti}")
    }

    pub async fn revoke(&self, claims: &Claims) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(Self::key(claims.jti))
            .arg(1)
            .arg("EX")
            .arg(claims.remaining_secs())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to revoke token: {e}")))
    }

    pub async fn is_revoked(&self, jti: Uuid) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXISTS")
            .arg(Self::key(jti))
            .query_async::<_, bool>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to check revocation: {e}")))
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub kind: AccountKind,
    pub id: Uuid,
    pub claims: Claims,
}

impl AuthUser {
    /// Returns the account id when the caller is of the given kind, 403 otherwise.
    pub fn require(&self, kind: AccountKind) -> Result<Uuid, AppError> {
        if self.kind == kind {
            Ok(self.id)
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Seekers and employers can take part in conversations; admins cannot.
    pub fn party(&self) -> Result<Party, AppError> {
        match self.kind {
            AccountKind::Seeker | AccountKind::Employer => Ok(Party::new(self.kind, self.id)),
            AccountKind::Admin => Err(AppError::Forbidden),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let claims = state.tokens.verify(token)?;

        if state.revocations.is_revoked(claims.jti).await? {
            tracing::debug!("Rejected revoked token {}", claims.jti);
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser {
            kind: claims.kind,
            id: claims.sub,
            claims,
        })
    }
}
