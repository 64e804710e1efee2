//! Notification fan-out.
//!
//! Events carry data only. The `Dispatcher` decides what each event turns into:
//! alert rows (primary, errors propagate) and email / SMS / realtime pushes
//! (best-effort, failures are logged and swallowed).

pub mod alerts;
pub mod broadcast;
pub mod handlers;
pub mod mail;
pub mod sms;

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::matching::MatchTier;
use crate::models::account::Party;
use crate::models::alert::{AlertKind, NewAlert};
use crate::models::application::ApplicationRow;
use crate::models::chat::{ChatMessageRow, DELETED_PLACEHOLDER};
use crate::models::job::JobRow;
use alerts::AlertRepository;
use broadcast::{BroadcastPayload, Broadcaster};
use mail::{status_update_mail, Mailer, OutgoingMail};
use sms::SmsSender;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail error: {0}")]
    Mail(String),
    #[error("broadcast error: {0}")]
    Broadcast(String),
    #[error("sms error: {0}")]
    Sms(String),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub enum Event {
    StatusChanged {
        application: ApplicationRow,
        job_title: String,
        employer_name: String,
    },
    JobPosted {
        job: JobRow,
        employer_name: String,
        recipients: Vec<(Party, MatchTier)>,
    },
    MessageSent {
        message: ChatMessageRow,
    },
    MessageDeleted {
        message_id: Uuid,
        session_id: Uuid,
        notify: Party,
    },
}

pub struct Dispatcher {
    alerts: Arc<dyn AlertRepository>,
    broadcaster: Arc<dyn Broadcaster>,
    mailer: Arc<dyn Mailer>,
    sms: Arc<dyn SmsSender>,
}

impl Dispatcher {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        broadcaster: Arc<dyn Broadcaster>,
        mailer: Arc<dyn Mailer>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            alerts,
            broadcaster,
            mailer,
            sms,
        }
    }

    pub async fn dispatch(&self, event: Event) -> Result<(), AppError> {
        match event {
            Event::StatusChanged {
                application,
                job_title,
                employer_name,
            } => {
                let seeker = Party::seeker(application.seeker_id);
                let alert = self
                    .alerts
                    .insert(NewAlert {
                        kind: AlertKind::StatusUpdate,
                        message: format!(
                            "{employer_name} marked your application for {job_title} as {}",
                            application.status
                        ),
                        recipient: seeker,
                    })
                    .await?;

                self.push(
                    alert.recipient(),
                    "application.status_updated",
                    json!({ "application": &application, "alert": alert }),
                )
                .await;

                self.send_mail(status_update_mail(
                    &application.name,
                    &application.email,
                    &job_title,
                    &employer_name,
                    application.status,
                ))
                .await;

                if let Some(phone) = application.phone.as_deref() {
                    let text = format!(
                        "{employer_name}: your application for {job_title} is now {}.",
                        application.status
                    );
                    best_effort("sms", self.sms.send_sms(phone, &text)).await;
                }
            }
            Event::JobPosted {
                job,
                employer_name,
                recipients,
            } => {
                for (recipient, tier) in recipients {
                    let alert = self
                        .alerts
                        .insert(NewAlert {
                            kind: AlertKind::JobPosted,
                            message: job_posted_message(tier, &job.title, &employer_name),
                            recipient,
                        })
                        .await?;
                    self.push(
                        alert.recipient(),
                        "job.posted",
                        json!({ "job": &job, "alert": alert }),
                    )
                    .await;
                }
            }
            Event::MessageSent { message } => {
                self.push(message.receiver(), "message.sent", json!({ "message": &message }))
                    .await;
            }
            Event::MessageDeleted {
                message_id,
                session_id,
                notify,
            } => {
                self.push(
                    notify,
                    "message.deleted",
                    json!({
                        "message_id": message_id,
                        "session_id": session_id,
                        "placeholder": DELETED_PLACEHOLDER,
                    }),
                )
                .await;
            }
        }
        Ok(())
    }

    /// Sends an email, logging instead of failing.
    pub async fn send_mail(&self, mail: OutgoingMail) {
        best_effort("email", self.mailer.send(mail)).await;
    }

    async fn push(&self, to: Party, event: &'static str, data: serde_json::Value) {
        let payload = BroadcastPayload { event, data };
        best_effort("broadcast", self.broadcaster.publish(&to.channel(), &payload)).await;
    }
}

fn job_posted_message(tier: MatchTier, title: &str, employer_name: &str) -> String {
    match tier {
        MatchTier::Hot => format!("Strong match for your profile: {title} at {employer_name}"),
        MatchTier::Warm => format!("New job matching your profile: {title} at {employer_name}"),
    }
}

async fn best_effort<F>(what: &str, fut: F)
where
    F: Future<Output = Result<(), NotifyError>>,
{
    if let Err(e) = fut.await {
        warn!("Best-effort {what} failed: {e}");
    }
}
