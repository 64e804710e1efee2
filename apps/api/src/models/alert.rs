use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::account::{AccountKind, Party};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "alert_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    StatusUpdate,
    JobPosted,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRow {
    pub id: Uuid,
    pub kind: AlertKind,
    pub message: String,
    pub recipient_kind: AccountKind,
    pub recipient_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertRow {
    pub fn recipient(&self) -> Party {
        Party::new(self.recipient_kind, self.recipient_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub kind: AlertKind,
    pub message: String,
    pub recipient: Party,
}
