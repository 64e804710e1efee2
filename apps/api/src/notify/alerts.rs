use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::account::Party;
use crate::models::alert::{AlertRow, NewAlert};
use crate::repository::RepositoryError;

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn insert(&self, alert: NewAlert) -> Result<AlertRow, RepositoryError>;
    async fn list(
        &self,
        recipient: Party,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<AlertRow>, RepositoryError>;
    /// Returns false when the alert does not exist or belongs to someone else.
    async fn mark_read(&self, id: Uuid, recipient: Party) -> Result<bool, RepositoryError>;
    async fn mark_all_read(&self, recipient: Party) -> Result<u64, RepositoryError>;
}

pub struct PgAlertRepository {
    pool: PgPool,
}

impl PgAlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for PgAlertRepository {
    async fn insert(&self, alert: NewAlert) -> Result<AlertRow, RepositoryError> {
        Ok(sqlx::query_as::<_, AlertRow>(
            r#"
            INSERT INTO alerts (id, kind, message, recipient_kind, recipient_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(alert.kind)
        .bind(alert.message)
        .bind(alert.recipient.kind)
        .bind(alert.recipient.id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list(
        &self,
        recipient: Party,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<AlertRow>, RepositoryError> {
        Ok(sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT * FROM alerts
            WHERE recipient_kind = $1 AND recipient_id = $2
              AND (NOT $3 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(recipient.kind)
        .bind(recipient.id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_read(&self, id: Uuid, recipient: Party) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE alerts SET is_read = TRUE WHERE id = $1 AND recipient_kind = $2 AND recipient_id = $3",
        )
        .bind(id)
        .bind(recipient.kind)
        .bind(recipient.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, recipient: Party) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE alerts SET is_read = TRUE WHERE recipient_kind = $1 AND recipient_id = $2 AND NOT is_read",
        )
        .bind(recipient.kind)
        .bind(recipient.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
