use std::sync::Arc;

use sqlx::PgPool;

use crate::applications::service::ApplicationService;
use crate::applications::upload::ChunkStore;
use crate::auth::token::TokenIssuer;
use crate::auth::Revocations;
use crate::bridge::TwilioClient;
use crate::chat::service::ChatService;
use crate::config::Config;
use crate::notify::alerts::AlertRepository;
use crate::notify::Dispatcher;
use crate::storage::ObjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub files: Arc<dyn ObjectStore>,
    pub tokens: TokenIssuer,
    pub revocations: Revocations,
    pub chunks: ChunkStore,
    pub dispatcher: Arc<Dispatcher>,
    pub alerts: Arc<dyn AlertRepository>,
    pub applications: ApplicationService,
    pub chat: ChatService,
    /// Present only when the conversation / video provider is configured.
    pub bridge: Option<Arc<TwilioClient>>,
}
