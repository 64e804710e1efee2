use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::account::Party;
use crate::models::chat::{
    ChatMessageRow, ChatSessionRow, DeleteSide, NewMessage, PartyPair, SessionStatus,
};
use crate::repository::RepositoryError;

/// Storage for sessions and messages.
///
/// `upsert_session` must be a single atomic check-and-insert: concurrent first
/// contact from both sides yields one session.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Returns the session for the pair and whether this call created it.
    async fn upsert_session(&self, pair: PartyPair) -> Result<(ChatSessionRow, bool), RepositoryError>;
    async fn session(&self, id: Uuid) -> Result<Option<ChatSessionRow>, RepositoryError>;
    async fn sessions_for(&self, party: Party) -> Result<Vec<ChatSessionRow>, RepositoryError>;
    async fn set_bridge_sid(&self, id: Uuid, sid: &str) -> Result<(), RepositoryError>;
    async fn set_status(&self, id: Uuid, status: SessionStatus) -> Result<(), RepositoryError>;
    /// Bumps `updated_at` and reactivates an archived session.
    async fn touch_session(&self, id: Uuid) -> Result<(), RepositoryError>;

    async fn insert_message(&self, message: NewMessage) -> Result<ChatMessageRow, RepositoryError>;
    async fn message(&self, id: Uuid) -> Result<Option<ChatMessageRow>, RepositoryError>;
    /// Messages the viewer has not deleted, oldest first.
    async fn visible_messages(
        &self,
        session_id: Uuid,
        viewer: Party,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatMessageRow>, RepositoryError>;
    async fn last_visible_message(
        &self,
        session_id: Uuid,
        viewer: Party,
    ) -> Result<Option<ChatMessageRow>, RepositoryError>;
    /// Sets `read_at` on unread messages addressed to `viewer`; `None` means every such message.
    async fn mark_read(
        &self,
        session_id: Uuid,
        viewer: Party,
        ids: Option<&[Uuid]>,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
    async fn flag_deleted(
        &self,
        id: Uuid,
        side: DeleteSide,
    ) -> Result<Option<ChatMessageRow>, RepositoryError>;
    async fn purge_message(&self, id: Uuid) -> Result<bool, RepositoryError>;
    async fn unread_count(&self, receiver: Party, session_id: Option<Uuid>) -> Result<i64, RepositoryError>;
    async fn recent_unread(&self, receiver: Party, limit: i64) -> Result<Vec<ChatMessageRow>, RepositoryError>;
}

pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UpsertedSession {
    #[sqlx(flatten)]
    session: ChatSessionRow,
    inserted: bool,
}

const VISIBLE_TO_VIEWER: &str = r#"
    ((sender_kind = $2 AND sender_id = $3 AND NOT deleted_by_sender)
      OR (receiver_kind = $2 AND receiver_id = $3 AND NOT deleted_by_receiver))
"#;

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn upsert_session(&self, pair: PartyPair) -> Result<(ChatSessionRow, bool), RepositoryError> {
        // The no-op DO UPDATE makes RETURNING yield the existing row; xmax = 0 only on a fresh insert.
        let row = sqlx::query_as::<_, UpsertedSession>(
            r#"
            INSERT INTO chat_sessions (id, party_a_kind, party_a_id, party_b_kind, party_b_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (party_a_kind, party_a_id, party_b_kind, party_b_id)
            DO UPDATE SET updated_at = chat_sessions.updated_at
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(pair.low().kind)
        .bind(pair.low().id)
        .bind(pair.high().kind)
        .bind(pair.high().id)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.session, row.inserted))
    }

    async fn session(&self, id: Uuid) -> Result<Option<ChatSessionRow>, RepositoryError> {
        Ok(
            sqlx::query_as::<_, ChatSessionRow>("SELECT * FROM chat_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn sessions_for(&self, party: Party) -> Result<Vec<ChatSessionRow>, RepositoryError> {
        Ok(sqlx::query_as::<_, ChatSessionRow>(
            r#"
            SELECT * FROM chat_sessions
            WHERE (party_a_kind = $1 AND party_a_id = $2)
               OR (party_b_kind = $1 AND party_b_id = $2)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(party.kind)
        .bind(party.id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_bridge_sid(&self, id: Uuid, sid: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE chat_sessions SET bridge_sid = $2 WHERE id = $1")
            .bind(id)
            .bind(sid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: SessionStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chat_sessions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn touch_session(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE chat_sessions SET updated_at = NOW(), status = 'active' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<ChatMessageRow, RepositoryError> {
        Ok(sqlx::query_as::<_, ChatMessageRow>(
            r#"
            INSERT INTO chat_messages
                (id, session_id, sender_kind, sender_id, receiver_kind, receiver_id, body)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.session_id)
        .bind(message.sender.kind)
        .bind(message.sender.id)
        .bind(message.receiver.kind)
        .bind(message.receiver.id)
        .bind(message.body)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn message(&self, id: Uuid) -> Result<Option<ChatMessageRow>, RepositoryError> {
        Ok(
            sqlx::query_as::<_, ChatMessageRow>("SELECT * FROM chat_messages WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn visible_messages(
        &self,
        session_id: Uuid,
        viewer: Party,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatMessageRow>, RepositoryError> {
        let sql = format!(
            "SELECT * FROM chat_messages WHERE session_id = $1 AND {VISIBLE_TO_VIEWER} \
             ORDER BY created_at ASC, id ASC LIMIT $4 OFFSET $5"
        );
        Ok(sqlx::query_as::<_, ChatMessageRow>(&sql)
            .bind(session_id)
            .bind(viewer.kind)
            .bind(viewer.id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn last_visible_message(
        &self,
        session_id: Uuid,
        viewer: Party,
    ) -> Result<Option<ChatMessageRow>, RepositoryError> {
        let sql = format!(
            "SELECT * FROM chat_messages WHERE session_id = $1 AND {VISIBLE_TO_VIEWER} \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, ChatMessageRow>(&sql)
            .bind(session_id)
            .bind(viewer.kind)
            .bind(viewer.id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn mark_read(
        &self,
        session_id: Uuid,
        viewer: Party,
        ids: Option<&[Uuid]>,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages SET read_at = $5
            WHERE session_id = $1
              AND receiver_kind = $2 AND receiver_id = $3
              AND ($4::uuid[] IS NULL OR id = ANY($4))
              AND read_at IS NULL
              AND NOT deleted_by_receiver
            "#,
        )
        .bind(session_id)
        .bind(viewer.kind)
        .bind(viewer.id)
        .bind(ids.map(<[Uuid]>::to_vec))
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn flag_deleted(
        &self,
        id: Uuid,
        side: DeleteSide,
    ) -> Result<Option<ChatMessageRow>, RepositoryError> {
        Ok(sqlx::query_as::<_, ChatMessageRow>(
            r#"
            UPDATE chat_messages SET
                deleted_by_sender = deleted_by_sender OR $2,
                deleted_by_receiver = deleted_by_receiver OR $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(side == DeleteSide::Sender)
        .bind(side == DeleteSide::Receiver)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn purge_message(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unread_count(&self, receiver: Party, session_id: Option<Uuid>) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM chat_messages
            WHERE receiver_kind = $1 AND receiver_id = $2
              AND read_at IS NULL AND NOT deleted_by_receiver
              AND ($3::uuid IS NULL OR session_id = $3)
            "#,
        )
        .bind(receiver.kind)
        .bind(receiver.id)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn recent_unread(&self, receiver: Party, limit: i64) -> Result<Vec<ChatMessageRow>, RepositoryError> {
        Ok(sqlx::query_as::<_, ChatMessageRow>(
            r#"
            SELECT * FROM chat_messages
            WHERE receiver_kind = $1 AND receiver_id = $2
              AND read_at IS NULL AND NOT deleted_by_receiver
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(receiver.kind)
        .bind(receiver.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
