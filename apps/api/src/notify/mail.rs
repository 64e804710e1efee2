//! Outgoing email over SMTP. Sending runs on the blocking pool.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

use crate::config::SmtpConfig;
use crate::models::application::ApplicationStatus;
use crate::notify::NotifyError;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), NotifyError>;
}

pub struct SmtpMailer {
    config: SmtpConfig,
    sender_name: String,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig, sender_name: impl Into<String>) -> Self {
        Self {
            config,
            sender_name: sender_name.into(),
        }
    }

    fn build(&self, mail: &OutgoingMail) -> Result<Message, NotifyError> {
        let from: Mailbox = format!("{} <{}>", self.sender_name, self.config.from_email)
            .parse()
            .map_err(|e| NotifyError::Mail(format!("invalid sender address: {e}")))?;
        let to: Mailbox = format!("{} <{}>", mail.to_name, mail.to_email)
            .parse()
            .map_err(|e| NotifyError::Mail(format!("invalid recipient address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| NotifyError::Mail(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), NotifyError> {
        let message = self.build(&mail)?;
        let server = self.config.server.clone();
        let creds = Credentials::new(self.config.user.clone(), self.config.pass.clone());

        tokio::task::spawn_blocking(move || -> Result<(), NotifyError> {
            let mailer = SmtpTransport::relay(&server)
                .map_err(|e| NotifyError::Mail(e.to_string()))?
                .credentials(creds)
                .build();
            mailer
                .send(&message)
                .map(|_| ())
                .map_err(|e| NotifyError::Mail(e.to_string()))
        })
        .await
        .map_err(|e| NotifyError::Mail(format!("mail task failed: {e}")))??;

        info!("Email '{}' sent to {}", mail.subject, mail.to_email);
        Ok(())
    }
}

/// Used when no SMTP server is configured.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), NotifyError> {
        debug!("SMTP not configured; dropping email '{}' to {}", mail.subject, mail.to_email);
        Ok(())
    }
}

pub fn status_update_mail(
    to_name: &str,
    to_email: &str,
    job_title: &str,
    employer_name: &str,
    status: ApplicationStatus,
) -> OutgoingMail {
    OutgoingMail {
        to_name: to_name.to_string(),
        to_email: to_email.to_string(),
        subject: format!("Your application for {job_title} was {status}"),
        body: format!(
            "Hi {to_name},\n\n{employer_name} updated your application for \"{job_title}\". \
             Its status is now: {status}.\n\nLog in to see the details."
        ),
    }
}

pub fn password_reset_mail(to_name: &str, to_email: &str, link: &str) -> OutgoingMail {
    OutgoingMail {
        to_name: to_name.to_string(),
        to_email: to_email.to_string(),
        subject: "Reset your password".to_string(),
        body: format!(
            "Hi {to_name},\n\nUse the link below to choose a new password. \
             It expires in one hour and can only be used once.\n\n{link}\n\n\
             If you did not ask for this, you can ignore this email."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_update_mail_mentions_job_and_status() {
        let mail = status_update_mail(
            "Ada",
            "ada@example.com",
            "Rust Engineer",
            "Acme",
            ApplicationStatus::Accepted,
        );
        assert_eq!(mail.subject, "Your application for Rust Engineer was accepted");
        assert!(mail.body.contains("Acme"));
        assert!(mail.body.contains("accepted"));
    }

    #[test]
    fn test_smtp_message_builds() {
        let mailer = SmtpMailer::new(
            SmtpConfig {
                server: "smtp.example.com".to_string(),
                user: "u".to_string(),
                pass: "p".to_string(),
                from_email: "jobs@example.com".to_string(),
            },
            "Job Board",
        );
        let mail = password_reset_mail("Ada", "ada@example.com", "https://x/reset?token=abc");
        assert!(mailer.build(&mail).is_ok());

        let bad = OutgoingMail {
            to_email: "not an address".to_string(),
            ..mail
        };
        assert!(mailer.build(&bad).is_err());
    }
}
