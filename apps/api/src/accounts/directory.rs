use async_trait::async_trait;
use sqlx::PgPool;

use crate::accounts::queries::{find_employer, find_seeker};
use crate::errors::AppError;
use crate::models::account::{AccountKind, Contact, Party};

/// Resolves a party to the contact card shown to the other side of a conversation.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn contact(&self, party: Party) -> Result<Option<Contact>, AppError>;
}

pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn contact(&self, party: Party) -> Result<Option<Contact>, AppError> {
        Ok(match party.kind {
            AccountKind::Seeker => find_seeker(&self.pool, party.id)
                .await?
                .map(|row| Contact::from(&row)),
            AccountKind::Employer => find_employer(&self.pool, party.id)
                .await?
                .map(|row| Contact::from(&row)),
            AccountKind::Admin => None,
        })
    }
}
