//! Bridge to the third-party messaging provider (Twilio).
//!
//! Covers outbound SMS, mirroring chat sessions into provider conversations,
//! and signing voice/video access grants. Every call here is best-effort from
//! the caller's point of view: nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::TwilioConfig;
use crate::models::account::Party;
use crate::models::chat::ChatSessionRow;
use crate::notify::sms::SmsSender;
use crate::notify::NotifyError;

const API_URL: &str = "https://api.twilio.com/2010-04-01";
const CONVERSATIONS_URL: &str = "https://conversations.twilio.com/v1";
const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
const MAX_ROOM_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid room name: {0}")]
    InvalidRoom(String),
}

/// Mirrors chat sessions into provider-side conversations.
#[async_trait]
pub trait ConversationBridge: Send + Sync {
    /// Creates the provider conversation for a session and returns its SID.
    async fn create_conversation(&self, session: &ChatSessionRow) -> Result<String, BridgeError>;
    async fn post_message(&self, conversation_sid: &str, author: Party, body: &str) -> Result<(), BridgeError>;
}

/// Identity string a party is known by on the provider side.
pub fn identity(party: Party) -> String {
    format!("{}:{}", party.kind.as_str(), party.id)
}

pub fn room_for_session(session_id: uuid::Uuid) -> String {
    format!("session-{session_id}")
}

#[derive(Debug, Deserialize)]
struct SidResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoGrant {
    pub room: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Grants {
    pub identity: String,
    pub video: VideoGrant,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub grants: Grants,
}

#[derive(Clone)]
pub struct TwilioClient {
    client: Client,
    config: TwilioConfig,
}

impl TwilioClient {
    pub fn new(config: TwilioConfig) -> Result<Self, BridgeError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(15)).build()?,
            config,
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T, BridgeError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(BridgeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Signs a short-lived video access grant for `party` in `room`.
    pub fn access_token(&self, party: Party, room: &str) -> Result<String, BridgeError> {
        let claims = access_token_claims(&self.config, party, room, Utc::now().timestamp())?;
        let header = Header {
            cty: Some("twilio-fpa;v=1".to_string()),
            ..Header::default()
        };
        Ok(encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )?)
    }
}

fn access_token_claims(
    config: &TwilioConfig,
    party: Party,
    room: &str,
    now: i64,
) -> Result<AccessTokenClaims, BridgeError> {
    let room = room.trim();
    if room.is_empty() || room.len() > MAX_ROOM_LEN {
        return Err(BridgeError::InvalidRoom(room.to_string()));
    }
    Ok(AccessTokenClaims {
        jti: format!("{}-{now}", config.api_key),
        iss: config.api_key.clone(),
        sub: config.account_sid.clone(),
        iat: now,
        exp: now + ACCESS_TOKEN_TTL_SECS,
        grants: Grants {
            identity: identity(party),
            video: VideoGrant {
                room: room.to_string(),
            },
        },
    })
}

#[async_trait]
impl ConversationBridge for TwilioClient {
    async fn create_conversation(&self, session: &ChatSessionRow) -> Result<String, BridgeError> {
        let name = room_for_session(session.id);
        let created: SidResponse = self
            .post_form(
                &format!("{CONVERSATIONS_URL}/Conversations"),
                &[("FriendlyName", name.as_str()), ("UniqueName", name.as_str())],
            )
            .await?;

        for party in [session.party_a(), session.party_b()] {
            let identity = identity(party);
            let _: SidResponse = self
                .post_form(
                    &format!("{CONVERSATIONS_URL}/Conversations/{}/Participants", created.sid),
                    &[("Identity", identity.as_str())],
                )
                .await?;
        }

        debug!("Created provider conversation {} for session {}", created.sid, session.id);
        Ok(created.sid)
    }

    async fn post_message(&self, conversation_sid: &str, author: Party, body: &str) -> Result<(), BridgeError> {
        let author = identity(author);
        let _: SidResponse = self
            .post_form(
                &format!("{CONVERSATIONS_URL}/Conversations/{conversation_sid}/Messages"),
                &[("Author", author.as_str()), ("Body", body)],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SmsSender for TwilioClient {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let url = format!("{API_URL}/Accounts/{}/Messages.json", self.config.account_sid);
        let sent: SidResponse = self
            .post_form(
                &url,
                &[("To", to), ("From", self.config.from_number.as_str()), ("Body", body)],
            )
            .await
            .map_err(|e| NotifyError::Sms(e.to_string()))?;
        debug!("SMS {} queued for {to}", sent.sid);
        Ok(())
    }
}
