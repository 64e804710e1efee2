//! Session tokens: HS256 JWTs naming the account and its kind.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::AccountKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub kind: AccountKind,
    /// Token id, used for logout revocation.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Seconds until expiry, never below one.
    pub fn remaining_secs(&self) -> u64 {
        (self.exp - Utc::now().timestamp()).max(1) as u64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
    pub kind: AccountKind,
    pub account_id: Uuid,
}

#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: String, ttl_secs: u64) -> Self {
        Self { secret, ttl_secs }
    }

    pub fn issue(&self, kind: AccountKind, account_id: Uuid) -> Result<IssuedToken, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: account_id,
            kind,
            jti: Uuid::new_v4(),
            iat: now,
            exp: now + self.ttl_secs as i64,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
            kind,
            account_id,
        })
    }

    /// Decodes and checks signature and expiry. Any failure is `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Rejected session token: {e}");
            AppError::Unauthorized
        })
    }
}
