//! In-memory repositories, recording side-effect sinks and row fixtures for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::accounts::directory::Directory;
use crate::applications::repository::ApplicationRepository;
use crate::applications::service::ApplicationService;
use crate::bridge::{BridgeError, ConversationBridge};
use crate::chat::repository::ChatRepository;
use crate::chat::service::ChatService;
use crate::errors::AppError;
use crate::models::account::{Contact, EmployerRow, Party, SeekerRow};
use crate::models::alert::{AlertRow, NewAlert};
use crate::models::application::{ApplicationRow, ApplicationStatus, NewApplication};
use crate::models::chat::{
    ChatMessageRow, ChatSessionRow, DeleteSide, NewMessage, PartyPair, SessionStatus,
};
use crate::models::job::JobRow;
use crate::notify::alerts::AlertRepository;
use crate::notify::broadcast::{BroadcastPayload, Broadcaster};
use crate::notify::mail::{Mailer, OutgoingMail};
use crate::notify::sms::SmsSender;
use crate::notify::{Dispatcher, NotifyError};
use crate::repository::RepositoryError;
use crate::storage::ObjectStore;

/// Migrated pool for database-backed tests. `None` skips the test when `DATABASE_URL` is unset.
pub async fn database() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(
        crate::db::create_pool(&url)
            .await
            .expect("DATABASE_URL is set but the database is unreachable"),
    )
}

pub fn seeker() -> SeekerRow {
    let id = Uuid::new_v4();
    SeekerRow {
        id,
        name: "Grace Hopper".to_string(),
        email: format!("grace-{id}@example.com"),
        password_hash: String::new(),
        phone: None,
        qualification: Some("Rust".to_string()),
        experience_level: Some("Senior".to_string()),
        education_level: Some("Masters".to_string()),
        address: None,
        photo_url: None,
        login_dates: Vec::new(),
        created_at: Utc::now(),
    }
}

pub fn employer() -> EmployerRow {
    let id = Uuid::new_v4();
    EmployerRow {
        id,
        org_name: "Initech".to_string(),
        domain: Some("initech.test".to_string()),
        contact_name: "Bill Lumbergh".to_string(),
        email: format!("bill-{id}@initech.test"),
        phone: None,
        password_hash: String::new(),
        logo_url: None,
        created_at: Utc::now(),
    }
}

pub fn job_for(employer: &EmployerRow) -> JobRow {
    let now = Utc::now();
    JobRow {
        id: Uuid::new_v4(),
        employer_id: employer.id,
        title: "Systems Engineer".to_string(),
        description: "Keep the lights on".to_string(),
        category: Some("Engineering".to_string()),
        salary_min: Some(100_000),
        salary_max: Some(140_000),
        location: Some("Remote".to_string()),
        required_skill: Some("Rust".to_string()),
        experience_level: Some("Senior".to_string()),
        education_level: Some("Masters".to_string()),
        job_type: Some("Full-time".to_string()),
        duration: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn application_for(job: &JobRow, seeker: &SeekerRow) -> ApplicationRow {
    let now = Utc::now();
    ApplicationRow {
        id: Uuid::new_v4(),
        job_id: job.id,
        seeker_id: seeker.id,
        name: seeker.name.clone(),
        email: seeker.email.clone(),
        phone: seeker.phone.clone(),
        qualification: seeker.qualification.clone(),
        experience_level: seeker.experience_level.clone(),
        education_level: seeker.education_level.clone(),
        status: ApplicationStatus::Pending,
        resume_url: None,
        video_url: None,
        created_at: now,
        updated_at: now,
    }
}

// Side-effect sinks

#[derive(Default)]
pub struct RecordingBroadcaster {
    published: Mutex<Vec<(String, BroadcastPayload)>>,
}

impl RecordingBroadcaster {
    pub fn published(&self) -> Vec<(String, BroadcastPayload)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn publish(&self, channel: &str, payload: &BroadcastPayload) -> Result<(), NotifyError> {
        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.clone()));
        Ok(())
    }
}

pub struct FailingBroadcaster;

#[async_trait]
impl Broadcaster for FailingBroadcaster {
    async fn publish(&self, _channel: &str, _payload: &BroadcastPayload) -> Result<(), NotifyError> {
        Err(NotifyError::Broadcast("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSms {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSms {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingBridge {
    pub fail: bool,
    conversations: Mutex<Vec<Uuid>>,
    posts: Mutex<Vec<(String, Party, String)>>,
}

impl RecordingBridge {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn conversations(&self) -> Vec<Uuid> {
        self.conversations.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(String, Party, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationBridge for RecordingBridge {
    async fn create_conversation(&self, session: &ChatSessionRow) -> Result<String, BridgeError> {
        if self.fail {
            return Err(BridgeError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.conversations.lock().unwrap().push(session.id);
        Ok(format!("CH{}", session.id.simple()))
    }

    async fn post_message(&self, conversation_sid: &str, author: Party, body: &str) -> Result<(), BridgeError> {
        if self.fail {
            return Err(BridgeError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.posts
            .lock()
            .unwrap()
            .push((conversation_sid.to_string(), author, body.to_string()));
        Ok(())
    }
}

// Repositories

#[derive(Default)]
pub struct MemoryAlerts {
    rows: Mutex<Vec<AlertRow>>,
}

impl MemoryAlerts {
    pub fn all(&self) -> Vec<AlertRow> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertRepository for MemoryAlerts {
    async fn insert(&self, alert: NewAlert) -> Result<AlertRow, RepositoryError> {
        let row = AlertRow {
            id: Uuid::new_v4(),
            kind: alert.kind,
            message: alert.message,
            recipient_kind: alert.recipient.kind,
            recipient_id: alert.recipient.id,
            is_read: false,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list(
        &self,
        recipient: Party,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<AlertRow>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|a| a.recipient() == recipient && (!unread_only || !a.is_read))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid, recipient: Party) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|a| a.id == id && a.recipient() == recipient) {
            Some(alert) => {
                alert.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient: Party) -> Result<u64, RepositoryError> {
        let mut changed = 0;
        for alert in self.rows.lock().unwrap().iter_mut() {
            if alert.recipient() == recipient && !alert.is_read {
                alert.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[derive(Default)]
pub struct MemoryApplications {
    rows: Mutex<Vec<ApplicationRow>>,
    stale_reads: bool,
}

impl MemoryApplications {
    /// `exists` always answers false, as when another request inserts between the check and the insert.
    pub fn with_stale_reads() -> Self {
        Self {
            stale_reads: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ApplicationRepository for MemoryApplications {
    async fn exists(&self, job_id: Uuid, email: &str) -> Result<bool, RepositoryError> {
        if self.stale_reads {
            return Ok(false);
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|a| a.job_id == job_id && a.email.eq_ignore_ascii_case(email)))
    }

    async fn insert(&self, new: NewApplication) -> Result<ApplicationRow, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|a| a.job_id == new.job_id && a.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(RepositoryError::Conflict);
        }
        let now = Utc::now();
        let row = ApplicationRow {
            id: Uuid::new_v4(),
            job_id: new.job_id,
            seeker_id: new.seeker_id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            qualification: new.qualification,
            experience_level: new.experience_level,
            education_level: new.education_level,
            status: ApplicationStatus::Pending,
            resume_url: new.resume_url,
            video_url: new.video_url,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ApplicationRow>, RepositoryError> {
        Ok(self.rows.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn for_seeker(&self, seeker_id: Uuid) -> Result<Vec<ApplicationRow>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|a| a.seeker_id == seeker_id)
            .cloned()
            .collect())
    }

    async fn for_job(
        &self,
        job_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRow>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.job_id == job_id && status.map_or(true, |s| a.status == s))
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        job_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<ApplicationRow>, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows
            .iter_mut()
            .find(|a| a.id == id && a.job_id == job_id)
            .map(|a| {
                a.status = status;
                a.updated_at = Utc::now();
                a.clone()
            }))
    }
}

/// Contacts keyed by party; unknown parties resolve to `None`.
#[derive(Default)]
pub struct MemoryDirectory {
    contacts: Mutex<Vec<Contact>>,
}

impl MemoryDirectory {
    pub fn with(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: Mutex::new(contacts),
        }
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn contact(&self, party: Party) -> Result<Option<Contact>, AppError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.party() == party)
            .cloned())
    }
}

#[derive(Default)]
struct ChatTables {
    sessions: Vec<ChatSessionRow>,
    messages: Vec<ChatMessageRow>,
}

/// Chat storage with a logical clock so ordering is deterministic.
#[derive(Default)]
pub struct MemoryChat {
    tables: Mutex<ChatTables>,
    ticks: Mutex<i64>,
}

impl MemoryChat {
    fn tick(&self) -> DateTime<Utc> {
        let mut ticks = self.ticks.lock().unwrap();
        *ticks += 1;
        Utc.timestamp_opt(*ticks, 0).unwrap()
    }

    pub fn session_count(&self) -> usize {
        self.tables.lock().unwrap().sessions.len()
    }

    pub fn raw_message(&self, id: Uuid) -> Option<ChatMessageRow> {
        self.tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }
}

#[async_trait]
impl ChatRepository for MemoryChat {
    async fn upsert_session(&self, pair: PartyPair) -> Result<(ChatSessionRow, bool), RepositoryError> {
        let now = self.tick();
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables
            .sessions
            .iter()
            .find(|s| s.party_a() == pair.low() && s.party_b() == pair.high())
        {
            return Ok((existing.clone(), false));
        }
        let row = ChatSessionRow {
            id: Uuid::new_v4(),
            party_a_kind: pair.low().kind,
            party_a_id: pair.low().id,
            party_b_kind: pair.high().kind,
            party_b_id: pair.high().id,
            status: SessionStatus::Active,
            bridge_sid: None,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.push(row.clone());
        Ok((row, true))
    }

    async fn session(&self, id: Uuid) -> Result<Option<ChatSessionRow>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn sessions_for(&self, party: Party) -> Result<Vec<ChatSessionRow>, RepositoryError> {
        let mut sessions: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| s.includes(party))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn set_bridge_sid(&self, id: Uuid, sid: &str) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepositoryError::NotFound)?;
        session.bridge_sid = Some(sid.to_string());
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: SessionStatus) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepositoryError::NotFound)?;
        session.status = status;
        Ok(())
    }

    async fn touch_session(&self, id: Uuid) -> Result<(), RepositoryError> {
        let now = self.tick();
        let mut tables = self.tables.lock().unwrap();
        if let Some(session) = tables.sessions.iter_mut().find(|s| s.id == id) {
            session.updated_at = now;
            session.status = SessionStatus::Active;
        }
        Ok(())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<ChatMessageRow, RepositoryError> {
        let row = ChatMessageRow {
            id: Uuid::new_v4(),
            session_id: message.session_id,
            sender_kind: message.sender.kind,
            sender_id: message.sender.id,
            receiver_kind: message.receiver.kind,
            receiver_id: message.receiver.id,
            body: message.body,
            read_at: None,
            deleted_by_sender: false,
            deleted_by_receiver: false,
            created_at: self.tick(),
        };
        self.tables.lock().unwrap().messages.push(row.clone());
        Ok(row)
    }

    async fn message(&self, id: Uuid) -> Result<Option<ChatMessageRow>, RepositoryError> {
        Ok(self.raw_message(id))
    }

    async fn visible_messages(
        &self,
        session_id: Uuid,
        viewer: Party,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatMessageRow>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.session_id == session_id && m.visible_to(viewer))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn last_visible_message(
        &self,
        session_id: Uuid,
        viewer: Party,
    ) -> Result<Option<ChatMessageRow>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .rev()
            .find(|m| m.session_id == session_id && m.visible_to(viewer))
            .cloned())
    }

    async fn mark_read(
        &self,
        session_id: Uuid,
        viewer: Party,
        ids: Option<&[Uuid]>,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut changed = 0;
        for m in self.tables.lock().unwrap().messages.iter_mut() {
            if m.session_id == session_id
                && m.receiver() == viewer
                && m.read_at.is_none()
                && !m.deleted_by_receiver
                && ids.map_or(true, |ids| ids.contains(&m.id))
            {
                m.read_at = Some(at);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn flag_deleted(
        &self,
        id: Uuid,
        side: DeleteSide,
    ) -> Result<Option<ChatMessageRow>, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.messages.iter_mut().find(|m| m.id == id).map(|m| {
            match side {
                DeleteSide::Sender => m.deleted_by_sender = true,
                DeleteSide::Receiver => m.deleted_by_receiver = true,
            }
            m.clone()
        }))
    }

    async fn purge_message(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.messages.len();
        tables.messages.retain(|m| m.id != id);
        Ok(tables.messages.len() < before)
    }

    async fn unread_count(&self, receiver: Party, session_id: Option<Uuid>) -> Result<i64, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| {
                m.receiver() == receiver
                    && m.read_at.is_none()
                    && !m.deleted_by_receiver
                    && session_id.map_or(true, |s| m.session_id == s)
            })
            .count() as i64)
    }

    async fn recent_unread(&self, receiver: Party, limit: i64) -> Result<Vec<ChatMessageRow>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .rev()
            .filter(|m| m.receiver() == receiver && m.read_at.is_none() && !m.deleted_by_receiver)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// Wiring

fn dispatcher_with(
    alerts: Arc<MemoryAlerts>,
    broadcasts: Arc<dyn Broadcaster>,
    mails: Arc<RecordingMailer>,
) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        alerts,
        broadcasts,
        mails,
        Arc::new(RecordingSms::default()),
    ))
}

/// Object store keeping uploads in memory. Puts to keys containing `fail_on` fail.
#[derive(Default)]
pub struct RecordingStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
}

impl RecordingStore {
    pub fn failing_on(fragment: &'static str) -> Self {
        Self {
            fail_on: Some(fragment),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, AppError> {
        if self.fail_on.is_some_and(|fragment| key.contains(fragment)) {
            return Err(AppError::Storage(format!("refusing {key}")));
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(format!("memory://{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Application service over memory storage, with its alert, mail and push sinks.
pub fn application_service() -> (
    ApplicationService,
    Arc<MemoryAlerts>,
    Arc<RecordingMailer>,
    Arc<RecordingBroadcaster>,
) {
    let alerts = Arc::new(MemoryAlerts::default());
    let mails = Arc::new(RecordingMailer::default());
    let broadcasts = Arc::new(RecordingBroadcaster::default());
    let dispatcher = dispatcher_with(alerts.clone(), broadcasts.clone(), mails.clone());
    let service = ApplicationService::new(
        Arc::new(MemoryApplications::default()),
        dispatcher,
        Arc::new(RecordingStore::default()),
    );
    (service, alerts, mails, broadcasts)
}

/// Application service wired to the given repository and object store.
pub fn upload_service(
    repo: MemoryApplications,
    store: RecordingStore,
) -> (ApplicationService, Arc<RecordingStore>) {
    let store = Arc::new(store);
    let dispatcher = dispatcher_with(
        Arc::new(MemoryAlerts::default()),
        Arc::new(RecordingBroadcaster::default()),
        Arc::new(RecordingMailer::default()),
    );
    let service = ApplicationService::new(Arc::new(repo), dispatcher, store.clone());
    (service, store)
}

pub struct ChatHarness {
    pub service: ChatService,
    pub repo: Arc<MemoryChat>,
    pub broadcasts: Arc<RecordingBroadcaster>,
    pub seeker: Party,
    pub employer: Party,
}

/// Chat service with one seeker and one employer registered in the directory.
pub fn chat_harness(
    broadcaster: Option<Arc<dyn Broadcaster>>,
    bridge: Option<Arc<dyn ConversationBridge>>,
) -> ChatHarness {
    let seeker = seeker();
    let employer = employer();
    let repo = Arc::new(MemoryChat::default());
    let broadcasts = Arc::new(RecordingBroadcaster::default());
    let dispatcher = dispatcher_with(
        Arc::new(MemoryAlerts::default()),
        broadcaster.unwrap_or_else(|| broadcasts.clone() as Arc<dyn Broadcaster>),
        Arc::new(RecordingMailer::default()),
    );
    let directory = Arc::new(MemoryDirectory::with(vec![
        Contact::from(&seeker),
        Contact::from(&employer),
    ]));
    ChatHarness {
        service: ChatService::new(repo.clone(), directory, dispatcher, bridge),
        repo,
        broadcasts,
        seeker: Party::seeker(seeker.id),
        employer: Party::employer(employer.id),
    }
}
