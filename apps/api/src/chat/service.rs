//! Two-party conversations with per-party deletion and read tracking.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::directory::Directory;
use crate::bridge::ConversationBridge;
use crate::chat::repository::ChatRepository;
use crate::db::page_bounds;
use crate::errors::AppError;
use crate::models::account::Party;
use crate::models::chat::{
    ChatMessageRow, ChatSessionRow, DeleteSide, NewMessage, PartyPair, SessionStatus,
    SessionSummary,
};
use crate::notify::{Dispatcher, Event};

pub const MAX_BODY_CHARS: usize = 5000;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_RECENT_UNREAD: i64 = 50;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeleteOutcome {
    pub message_id: Uuid,
    /// True once the row is gone for both parties.
    pub purged: bool,
}

#[derive(Clone)]
pub struct ChatService {
    repo: Arc<dyn ChatRepository>,
    directory: Arc<dyn Directory>,
    dispatcher: Arc<Dispatcher>,
    bridge: Option<Arc<dyn ConversationBridge>>,
}

impl ChatService {
    pub fn new(
        repo: Arc<dyn ChatRepository>,
        directory: Arc<dyn Directory>,
        dispatcher: Arc<Dispatcher>,
        bridge: Option<Arc<dyn ConversationBridge>>,
    ) -> Self {
        Self {
            repo,
            directory,
            dispatcher,
            bridge,
        }
    }

    /// Returns the session for the unordered pair, creating it on first contact.
    pub async fn get_or_create_session(&self, me: Party, other: Party) -> Result<ChatSessionRow, AppError> {
        let pair = PartyPair::new(me, other)
            .ok_or_else(|| AppError::Validation("Cannot start a conversation with yourself".into()))?;

        if self.directory.contact(other).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "No {} account with id {}",
                other.kind.as_str(),
                other.id
            )));
        }

        let (mut session, created) = self.repo.upsert_session(pair).await?;
        if created {
            info!("Created chat session {} between {:?} and {:?}", session.id, me, other);
            if let Some(sid) = self.open_bridge_conversation(&session).await {
                session.bridge_sid = Some(sid);
            }
        }
        Ok(session)
    }

    async fn open_bridge_conversation(&self, session: &ChatSessionRow) -> Option<String> {
        let bridge = self.bridge.as_ref()?;
        let sid = match bridge.create_conversation(session).await {
            Ok(sid) => sid,
            Err(e) => {
                warn!("Provider conversation for session {} not created: {e}", session.id);
                return None;
            }
        };
        if let Err(e) = self.repo.set_bridge_sid(session.id, &sid).await {
            warn!("Could not store provider conversation {sid} for session {}: {e}", session.id);
            return None;
        }
        Some(sid)
    }

    async fn member_session(&self, session_id: Uuid, viewer: Party) -> Result<ChatSessionRow, AppError> {
        let session = self
            .repo
            .session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chat session {session_id} not found")))?;
        if !session.includes(viewer) {
            return Err(AppError::Forbidden);
        }
        Ok(session)
    }

    /// Stores a message and pushes it to the receiver. `receiver` defaults to the counterpart.
    pub async fn send_message(
        &self,
        session_id: Uuid,
        sender: Party,
        receiver: Option<Party>,
        body: &str,
    ) -> Result<ChatMessageRow, AppError> {
        let session = self.member_session(session_id, sender).await?;
        let receiver = match receiver {
            Some(r) if r != sender && session.includes(r) => r,
            Some(_) => return Err(AppError::Forbidden),
            None => session.counterpart(sender).ok_or(AppError::Forbidden)?,
        };

        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("Message body cannot be empty".into()));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(AppError::Validation(format!(
                "Message body exceeds {MAX_BODY_CHARS} characters"
            )));
        }

        let message = self
            .repo
            .insert_message(NewMessage {
                session_id,
                sender,
                receiver,
                body: body.to_string(),
            })
            .await?;
        self.repo.touch_session(session_id).await?;

        self.dispatcher
            .dispatch(Event::MessageSent {
                message: message.clone(),
            })
            .await?;

        if let (Some(bridge), Some(sid)) = (self.bridge.as_ref(), session.bridge_sid.as_deref()) {
            if let Err(e) = bridge.post_message(sid, sender, &message.body).await {
                warn!("Message {} not mirrored to provider conversation {sid}: {e}", message.id);
            }
        }

        Ok(message)
    }

    pub async fn list_messages(
        &self,
        session_id: Uuid,
        viewer: Party,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Vec<ChatMessageRow>, AppError> {
        self.member_session(session_id, viewer).await?;
        let (limit, offset) = page_bounds(page, per_page, MAX_PAGE_SIZE);
        Ok(self
            .repo
            .visible_messages(session_id, viewer, limit, offset)
            .await?)
    }

    /// Marks unread messages addressed to `viewer` as read; returns how many changed.
    pub async fn mark_read(
        &self,
        session_id: Uuid,
        viewer: Party,
        ids: Option<&[Uuid]>,
    ) -> Result<u64, AppError> {
        self.member_session(session_id, viewer).await?;
        if ids.is_some_and(|ids| ids.is_empty()) {
            return Ok(0);
        }
        Ok(self
            .repo
            .mark_read(session_id, viewer, ids, Utc::now())
            .await?)
    }

    pub async fn delete_message(
        &self,
        message_id: Uuid,
        actor: Party,
        for_everyone: bool,
    ) -> Result<DeleteOutcome, AppError> {
        let not_found = || AppError::NotFound(format!("Message {message_id} not found"));
        let message = self.repo.message(message_id).await?.ok_or_else(not_found)?;

        if message.sender() != actor && message.receiver() != actor {
            return Err(AppError::Forbidden);
        }
        if !message.visible_to(actor) {
            return Err(not_found());
        }

        if for_everyone {
            if message.sender() != actor {
                return Err(AppError::Forbidden);
            }
            self.repo.purge_message(message_id).await?;
            self.dispatcher
                .dispatch(Event::MessageDeleted {
                    message_id,
                    session_id: message.session_id,
                    notify: message.receiver(),
                })
                .await?;
            return Ok(DeleteOutcome {
                message_id,
                purged: true,
            });
        }

        let side = if message.sender() == actor {
            DeleteSide::Sender
        } else {
            DeleteSide::Receiver
        };
        let updated = self
            .repo
            .flag_deleted(message_id, side)
            .await?
            .ok_or_else(not_found)?;

        let purged = if updated.hidden_from_all() {
            self.repo.purge_message(message_id).await?;
            true
        } else {
            false
        };
        Ok(DeleteOutcome { message_id, purged })
    }

    pub async fn unread_count(&self, receiver: Party) -> Result<i64, AppError> {
        Ok(self.repo.unread_count(receiver, None).await?)
    }

    pub async fn recent_unread(&self, receiver: Party, limit: Option<i64>) -> Result<Vec<ChatMessageRow>, AppError> {
        let limit = limit.unwrap_or(5).clamp(1, MAX_RECENT_UNREAD);
        Ok(self.repo.recent_unread(receiver, limit).await?)
    }

    /// Conversations for `viewer`, most recently active first.
    pub async fn list_sessions(&self, viewer: Party) -> Result<Vec<SessionSummary>, AppError> {
        let sessions = self.repo.sessions_for(viewer).await?;
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            let contact = match session.counterpart(viewer) {
                Some(other) => self.directory.contact(other).await?,
                None => None,
            };
            let last_message = self.repo.last_visible_message(session.id, viewer).await?;
            let unread = self.repo.unread_count(viewer, Some(session.id)).await?;
            summaries.push(SessionSummary {
                session,
                contact,
                last_message,
                unread,
            });
        }
        Ok(summaries)
    }

    pub async fn archive_session(&self, session_id: Uuid, viewer: Party) -> Result<(), AppError> {
        self.member_session(session_id, viewer).await?;
        self.repo.set_status(session_id, SessionStatus::Archived).await?;
        Ok(())
    }

    /// Ensures `viewer` belongs to the session before a media grant is issued for it.
    pub async fn authorize_room(&self, session_id: Uuid, viewer: Party) -> Result<ChatSessionRow, AppError> {
        self.member_session(session_id, viewer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::{AccountKind, Contact};
    use crate::testing::{chat_harness, FailingBroadcaster, RecordingBridge};

    #[tokio::test]
    async fn get_or_create_is_idempotent_and_order_independent() {
        let h = chat_harness(None, None);

        let first = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let second = h.service.get_or_create_session(h.employer, h.seeker).await.unwrap();
        let third = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, third.id);
        assert_eq!(h.repo.session_count(), 1);
    }

    #[tokio::test]
    async fn session_with_self_is_rejected() {
        let h = chat_harness(None, None);
        let err = h
            .service
            .get_or_create_session(h.seeker, h.seeker)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn session_with_unknown_account_is_not_found() {
        let h = chat_harness(None, None);
        let err = h
            .service
            .get_or_create_session(h.seeker, Party::employer(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn send_pushes_to_receiver_and_lists_in_order() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();

        h.service.send_message(session.id, h.seeker, None, "hello").await.unwrap();
        h.service.send_message(session.id, h.employer, None, "hi there").await.unwrap();
        h.service.send_message(session.id, h.seeker, None, "  when can we talk?  ").await.unwrap();

        let messages = h
            .service
            .list_messages(session.id, h.employer, None, None)
            .await
            .unwrap();
        let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["hello", "hi there", "when can we talk?"]);
        assert_eq!(messages[1].receiver(), h.seeker);

        let pushes = h.broadcasts.published();
        assert_eq!(pushes.len(), 3);
        assert_eq!(pushes[0].0, h.employer.channel());
        assert_eq!(pushes[0].1.event, "message.sent");
        assert_eq!(pushes[1].0, h.seeker.channel());
    }

    #[tokio::test]
    async fn empty_or_oversized_bodies_are_rejected() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();

        let err = h.service.send_message(session.id, h.seeker, None, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let long = "x".repeat(MAX_BODY_CHARS + 1);
        let err = h.service.send_message(session.id, h.seeker, None, &long).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn outsiders_cannot_read_or_write() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let stranger = Party::seeker(Uuid::new_v4());

        let err = h.service.send_message(session.id, stranger, None, "hey").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = h.service.list_messages(session.id, stranger, None, None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        let err = h
            .service
            .send_message(session.id, h.seeker, Some(stranger), "hey")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn mark_read_is_idempotent_and_clears_unread() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        for body in ["one", "two"] {
            h.service.send_message(session.id, h.seeker, None, body).await.unwrap();
        }
        assert_eq!(h.service.unread_count(h.employer).await.unwrap(), 2);
        assert_eq!(h.service.unread_count(h.seeker).await.unwrap(), 0);

        assert_eq!(h.service.mark_read(session.id, h.employer, None).await.unwrap(), 2);
        assert_eq!(h.service.mark_read(session.id, h.employer, None).await.unwrap(), 0);
        assert_eq!(h.service.unread_count(h.employer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_read_by_ids_only_touches_those_messages() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let first = h.service.send_message(session.id, h.seeker, None, "one").await.unwrap();
        h.service.send_message(session.id, h.seeker, None, "two").await.unwrap();

        assert_eq!(h.service.mark_read(session.id, h.employer, Some(&[first.id])).await.unwrap(), 1);
        assert_eq!(h.service.mark_read(session.id, h.employer, Some(&[])).await.unwrap(), 0);
        // The sender cannot mark their own outgoing messages.
        assert_eq!(h.service.mark_read(session.id, h.seeker, None).await.unwrap(), 0);
        assert_eq!(h.service.unread_count(h.employer).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_unread_is_newest_first_and_bounded() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        for i in 0..7 {
            h.service
                .send_message(session.id, h.seeker, None, &format!("m{i}"))
                .await
                .unwrap();
        }

        let recent = h.service.recent_unread(h.employer, None).await.unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].body, "m6");
        assert_eq!(h.service.recent_unread(h.employer, Some(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_sided_delete_hides_only_for_that_party() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let message = h.service.send_message(session.id, h.seeker, None, "oops").await.unwrap();

        let outcome = h.service.delete_message(message.id, h.seeker, false).await.unwrap();
        assert!(!outcome.purged);

        assert!(h.service.list_messages(session.id, h.seeker, None, None).await.unwrap().is_empty());
        assert_eq!(h.service.list_messages(session.id, h.employer, None, None).await.unwrap().len(), 1);

        let err = h.service.delete_message(message.id, h.seeker, false).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_from_both_sides_removes_the_message() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let message = h.service.send_message(session.id, h.seeker, None, "bye").await.unwrap();

        h.service.delete_message(message.id, h.employer, false).await.unwrap();
        let outcome = h.service.delete_message(message.id, h.seeker, false).await.unwrap();

        assert!(outcome.purged);
        assert!(h.repo.raw_message(message.id).is_none());
        for viewer in [h.seeker, h.employer] {
            assert!(h.service.list_messages(session.id, viewer, None, None).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn receiver_delete_clears_their_unread() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let message = h.service.send_message(session.id, h.seeker, None, "spam").await.unwrap();

        h.service.delete_message(message.id, h.employer, false).await.unwrap();
        assert_eq!(h.service.unread_count(h.employer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_read_skips_messages_the_receiver_hid() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let hidden = h.service.send_message(session.id, h.seeker, None, "spam").await.unwrap();
        h.service.send_message(session.id, h.seeker, None, "hello").await.unwrap();
        h.service.delete_message(hidden.id, h.employer, false).await.unwrap();

        assert_eq!(h.service.mark_read(session.id, h.employer, None).await.unwrap(), 1);
        assert!(h.repo.raw_message(hidden.id).unwrap().read_at.is_none());
    }

    #[tokio::test]
    async fn delete_for_everyone_is_sender_only() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let message = h.service.send_message(session.id, h.seeker, None, "secret").await.unwrap();

        let err = h.service.delete_message(message.id, h.employer, true).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert!(h.repo.raw_message(message.id).is_some());

        let outcome = h.service.delete_message(message.id, h.seeker, true).await.unwrap();
        assert!(outcome.purged);
        assert!(h.repo.raw_message(message.id).is_none());

        let last = h.broadcasts.published().pop().unwrap();
        assert_eq!(last.0, h.employer.channel());
        assert_eq!(last.1.event, "message.deleted");
    }

    #[tokio::test]
    async fn strangers_cannot_delete() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        let message = h.service.send_message(session.id, h.seeker, None, "mine").await.unwrap();

        let err = h
            .service
            .delete_message(message.id, Party::seeker(Uuid::new_v4()), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn push_failure_does_not_fail_send() {
        let h = chat_harness(Some(Arc::new(FailingBroadcaster)), None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();

        let message = h.service.send_message(session.id, h.seeker, None, "still here").await.unwrap();
        assert_eq!(h.repo.raw_message(message.id).unwrap().body, "still here");
    }

    #[tokio::test]
    async fn list_sessions_shows_contact_last_message_and_unread() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        h.service.send_message(session.id, h.employer, None, "we liked your CV").await.unwrap();

        let summaries = h.service.list_sessions(h.seeker).await.unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.unread, 1);
        assert_eq!(summary.last_message.as_ref().unwrap().body, "we liked your CV");
        match summary.contact.as_ref().unwrap() {
            Contact::Employer { id, .. } => assert_eq!(*id, h.employer.id),
            other => panic!("unexpected contact {other:?}"),
        }
        assert_eq!(summary.contact.as_ref().unwrap().party().kind, AccountKind::Employer);
    }

    #[tokio::test]
    async fn sending_reactivates_archived_session() {
        let h = chat_harness(None, None);
        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        h.service.archive_session(session.id, h.seeker).await.unwrap();
        assert_eq!(
            h.service.authorize_room(session.id, h.seeker).await.unwrap().status,
            SessionStatus::Archived
        );

        h.service.send_message(session.id, h.employer, None, "ping").await.unwrap();
        assert_eq!(
            h.service.authorize_room(session.id, h.seeker).await.unwrap().status,
            SessionStatus::Active
        );
    }

    #[tokio::test]
    async fn bridge_mirrors_new_sessions_and_messages() {
        let bridge = Arc::new(RecordingBridge::default());
        let h = chat_harness(None, Some(bridge.clone()));

        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        assert!(session.bridge_sid.is_some());
        h.service.get_or_create_session(h.employer, h.seeker).await.unwrap();
        assert_eq!(bridge.conversations().len(), 1);

        h.service.send_message(session.id, h.seeker, None, "mirrored").await.unwrap();
        let posts = bridge.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1, h.seeker);
    }

    #[tokio::test]
    async fn bridge_failures_are_ignored() {
        let h = chat_harness(None, Some(Arc::new(RecordingBridge::failing())));

        let session = h.service.get_or_create_session(h.seeker, h.employer).await.unwrap();
        assert!(session.bridge_sid.is_none());
        h.service.send_message(session.id, h.seeker, None, "local only").await.unwrap();
    }
}
