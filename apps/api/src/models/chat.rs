use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::account::{AccountKind, Contact, Party};

/// Text pushed to the other party when a message is removed for everyone.
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Archived,
}

/// An unordered pair of parties, stored lowest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartyPair {
    low: Party,
    high: Party,
}

impl PartyPair {
    /// Returns `None` when both sides are the same party.
    pub fn new(a: Party, b: Party) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> Party {
        self.low
    }

    pub fn high(&self) -> Party {
        self.high
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSessionRow {
    pub id: Uuid,
    pub party_a_kind: AccountKind,
    pub party_a_id: Uuid,
    pub party_b_kind: AccountKind,
    pub party_b_id: Uuid,
    pub status: SessionStatus,
    pub bridge_sid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSessionRow {
    pub fn party_a(&self) -> Party {
        Party::new(self.party_a_kind, self.party_a_id)
    }

    pub fn party_b(&self) -> Party {
        Party::new(self.party_b_kind, self.party_b_id)
    }

    pub fn includes(&self, party: Party) -> bool {
        self.party_a() == party || self.party_b() == party
    }

    /// The other participant, if `party` is in this session.
    pub fn counterpart(&self, party: Party) -> Option<Party> {
        if self.party_a() == party {
            Some(self.party_b())
        } else if self.party_b() == party {
            Some(self.party_a())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessageRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_kind: AccountKind,
    pub sender_id: Uuid,
    pub receiver_kind: AccountKind,
    pub receiver_id: Uuid,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub deleted_by_sender: bool,
    pub deleted_by_receiver: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessageRow {
    pub fn sender(&self) -> Party {
        Party::new(self.sender_kind, self.sender_id)
    }

    pub fn receiver(&self) -> Party {
        Party::new(self.receiver_kind, self.receiver_id)
    }

    pub fn visible_to(&self, viewer: Party) -> bool {
        (self.sender() == viewer && !self.deleted_by_sender)
            || (self.receiver() == viewer && !self.deleted_by_receiver)
    }

    pub fn hidden_from_all(&self) -> bool {
        self.deleted_by_sender && self.deleted_by_receiver
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub sender: Party,
    pub receiver: Party,
    pub body: String,
}

/// Which per-party visibility flag a delete sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteSide {
    Sender,
    Receiver,
}

/// A conversation as listed for one of its participants.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session: ChatSessionRow,
    pub contact: Option<Contact>,
    pub last_message: Option<ChatMessageRow>,
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_order_independent() {
        let a = Party::seeker(Uuid::new_v4());
        let b = Party::employer(Uuid::new_v4());
        assert_eq!(PartyPair::new(a, b), PartyPair::new(b, a));
    }

    #[test]
    fn test_pair_rejects_self() {
        let a = Party::seeker(Uuid::new_v4());
        assert!(PartyPair::new(a, a).is_none());
    }

    #[test]
    fn test_same_id_different_kind_is_a_valid_pair() {
        let id = Uuid::new_v4();
        let pair = PartyPair::new(Party::employer(id), Party::seeker(id)).unwrap();
        assert_eq!(pair.low().kind, AccountKind::Seeker);
    }
}
