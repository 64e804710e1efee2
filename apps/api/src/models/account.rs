use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The three kinds of account the API authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Seeker,
    Employer,
    Admin,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Seeker => "seeker",
            AccountKind::Employer => "employer",
            AccountKind::Admin => "admin",
        }
    }
}

/// One side of a conversation, or the recipient of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Party {
    pub kind: AccountKind,
    pub id: Uuid,
}

impl Party {
    pub fn new(kind: AccountKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn seeker(id: Uuid) -> Self {
        Self::new(AccountKind::Seeker, id)
    }

    #[cfg(test)]
    pub fn employer(id: Uuid) -> Self {
        Self::new(AccountKind::Employer, id)
    }

    /// Private realtime channel for this party.
    pub fn channel(&self) -> String {
        format!("private-{}.{}", self.kind.as_str(), self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SeekerRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub address: Option<String>,
    pub photo_url: Option<String>,
    pub login_dates: Vec<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmployerRow {
    pub id: Uuid,
    pub org_name: String,
    pub domain: Option<String>,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The counterpart shown in a conversation list, shaped per account kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Contact {
    Seeker {
        id: Uuid,
        name: String,
        email: String,
        photo_url: Option<String>,
    },
    Employer {
        id: Uuid,
        org_name: String,
        contact_name: String,
        email: String,
        logo_url: Option<String>,
    },
}

impl Contact {
    #[cfg(test)]
    pub fn party(&self) -> Party {
        match self {
            Contact::Seeker { id, .. } => Party::seeker(*id),
            Contact::Employer { id, .. } => Party::employer(*id),
        }
    }
}

impl From<&SeekerRow> for Contact {
    fn from(row: &SeekerRow) -> Self {
        Contact::Seeker {
            id: row.id,
            name: row.name.clone(),
            email: row.email.clone(),
            photo_url: row.photo_url.clone(),
        }
    }
}

impl From<&EmployerRow> for Contact {
    fn from(row: &EmployerRow) -> Self {
        Contact::Employer {
            id: row.id,
            org_name: row.org_name.clone(),
            contact_name: row.contact_name.clone(),
            email: row.email.clone(),
            logo_url: row.logo_url.clone(),
        }
    }
}
