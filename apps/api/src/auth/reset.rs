//! Single-use password reset tokens. Only the SHA-256 of a token is stored.

use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::AccountKind;

pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

pub fn reset_link(app_base_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={token}", app_base_url.trim_end_matches('/'))
}

/// Stores a fresh token for the account and returns the plaintext to send.
pub async fn create_reset(pool: &PgPool, kind: AccountKind, account_id: Uuid) -> Result<String, AppError> {
    let token = generate_token();
    sqlx::query(
        r#"
        INSERT INTO password_resets (token_hash, account_kind, account_id, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(hash_token(&token))
    .bind(kind)
    .bind(account_id)
    .bind(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES))
    .execute(pool)
    .await?;
    Ok(token)
}

/// Marks the token used and returns its account. Unknown, used and expired
/// tokens are all rejected the same way.
pub async fn consume_reset(pool: &PgPool, token: &str) -> Result<(AccountKind, Uuid), AppError> {
    sqlx::query_as::<_, (AccountKind, Uuid)>(
        r#"
        UPDATE password_resets SET used_at = NOW()
        WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
        RETURNING account_kind, account_id
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::UnprocessableEntity("Reset token is invalid or has expired".to_string()))
}
