use async_trait::async_trait;
use tracing::debug;

use crate::notify::NotifyError;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError>;
}

/// Used when no SMS provider is configured.
pub struct DisabledSms;

#[async_trait]
impl SmsSender for DisabledSms {
    async fn send_sms(&self, to: &str, _body: &str) -> Result<(), NotifyError> {
        debug!("SMS provider not configured; dropping text to {to}");
        Ok(())
    }
}
