mod accounts;
mod admin;
mod applications;
mod auth;
mod bridge;
mod chat;
mod config;
mod db;
mod errors;
mod jobs;
mod models;
mod notify;
mod repository;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::accounts::directory::PgDirectory;
use crate::applications::repository::PgApplicationRepository;
use crate::applications::service::ApplicationService;
use crate::applications::upload::ChunkStore;
use crate::auth::token::TokenIssuer;
use crate::auth::Revocations;
use crate::bridge::{ConversationBridge, TwilioClient};
use crate::chat::repository::PgChatRepository;
use crate::chat::service::ChatService;
use crate::config::Config;
use crate::db::create_pool;
use crate::notify::alerts::{AlertRepository, PgAlertRepository};
use crate::notify::broadcast::RedisBroadcaster;
use crate::notify::mail::{DisabledMailer, Mailer, SmtpMailer};
use crate::notify::sms::{DisabledSms, SmsSender};
use crate::notify::Dispatcher;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{FileStore, ObjectStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting job board API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (migrations run here)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis: realtime broadcast and token revocation share one multiplexed connection
    let redis = redis::Client::open(config.redis_url.clone())?;
    let redis_conn = redis.get_multiplexed_async_connection().await?;
    info!("Redis connection established");

    // Initialize S3 / MinIO
    let files: Arc<dyn ObjectStore> = Arc::new(FileStore::from_config(&config).await);
    info!("File store initialized (bucket: {})", config.s3_bucket);

    let mailer: Arc<dyn Mailer> = match config.smtp.clone() {
        Some(smtp) => {
            info!("SMTP mail enabled via {}", smtp.server);
            Arc::new(SmtpMailer::new(smtp, "Job Board"))
        }
        None => {
            warn!("SMTP_SERVER not set; outgoing email is disabled");
            Arc::new(DisabledMailer)
        }
    };

    let bridge = match config.twilio.clone() {
        Some(twilio) => {
            info!("Conversation bridge enabled for account {}", twilio.account_sid);
            Some(Arc::new(TwilioClient::new(twilio)?))
        }
        None => {
            warn!("TWILIO_ACCOUNT_SID not set; SMS, conversation mirroring and video grants are disabled");
            None
        }
    };
    let sms: Arc<dyn SmsSender> = match &bridge {
        Some(client) => client.clone(),
        None => Arc::new(DisabledSms),
    };

    let alerts: Arc<dyn AlertRepository> = Arc::new(PgAlertRepository::new(db.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        alerts.clone(),
        Arc::new(RedisBroadcaster::new(redis_conn.clone())),
        mailer,
        sms,
    ));

    let applications = ApplicationService::new(
        Arc::new(PgApplicationRepository::new(db.clone())),
        dispatcher.clone(),
        files.clone(),
    );
    let chat = ChatService::new(
        Arc::new(PgChatRepository::new(db.clone())),
        Arc::new(PgDirectory::new(db.clone())),
        dispatcher.clone(),
        bridge
            .clone()
            .map(|client| client as Arc<dyn ConversationBridge>),
    );

    tokio::fs::create_dir_all(&config.upload_tmp_dir).await?;
    info!("Staging chunked uploads in {}", config.upload_tmp_dir.display());

    // Build app state
    let state = AppState {
        db,
        files,
        tokens: TokenIssuer::new(config.jwt_secret.clone(), config.token_ttl_secs),
        revocations: Revocations::new(redis_conn),
        chunks: ChunkStore::new(config.upload_tmp_dir.clone()),
        dispatcher,
        alerts,
        applications,
        chat,
        bridge,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
