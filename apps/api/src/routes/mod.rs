pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};

use crate::accounts::handlers as accounts;
use crate::admin::handlers as admin;
use crate::applications::handlers as applications;
use crate::auth::handlers as auth;
use crate::chat::handlers as chat;
use crate::jobs::handlers as jobs;
use crate::notify::handlers as alerts;
use crate::state::AppState;

/// Request bodies above this are rejected; large videos go through the chunk endpoints.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/v1", api_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/seeker/register", post(auth::handle_register_seeker))
        .route("/auth/employer/register", post(auth::handle_register_employer))
        .route("/auth/seeker/login", post(auth::handle_seeker_login))
        .route("/auth/employer/login", post(auth::handle_employer_login))
        .route("/auth/admin/login", post(auth::handle_admin_login))
        .route("/auth/logout", post(auth::handle_logout))
        .route(
            "/auth/seeker/password/forgot",
            post(auth::handle_seeker_forgot_password),
        )
        .route(
            "/auth/employer/password/forgot",
            post(auth::handle_employer_forgot_password),
        )
        .route("/auth/password/reset", post(auth::handle_reset_password))
        // Profiles
        .route(
            "/me",
            get(accounts::handle_get_me).put(accounts::handle_update_me),
        )
        .route("/me/photo", post(accounts::handle_upload_photo))
        // Jobs
        .route(
            "/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route("/jobs/matches/:tier", get(jobs::handle_seeker_matches))
        .route(
            "/jobs/:id",
            get(jobs::handle_get_job)
                .put(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        .route("/jobs/:id/candidates/:tier", get(jobs::handle_job_candidates))
        .route(
            "/jobs/:id/applications",
            get(applications::handle_job_applications),
        )
        .route("/employer/jobs", get(jobs::handle_employer_jobs))
        // Applications
        .route("/applications", post(applications::handle_apply))
        .route(
            "/applications/upload",
            post(applications::handle_apply_with_files),
        )
        .route("/applications/chunks", post(applications::handle_upload_chunk))
        .route(
            "/applications/chunks/complete",
            post(applications::handle_complete_upload),
        )
        .route(
            "/applications/mine",
            get(applications::handle_my_applications),
        )
        .route("/applications/:id", get(applications::handle_get_application))
        .route(
            "/applications/:id/status",
            patch(applications::handle_update_status),
        )
        // Chat
        .route(
            "/chat/sessions",
            get(chat::handle_list_sessions).post(chat::handle_open_session),
        )
        .route(
            "/chat/sessions/:id/archive",
            post(chat::handle_archive_session),
        )
        .route(
            "/chat/sessions/:id/messages",
            get(chat::handle_list_messages).post(chat::handle_send_message),
        )
        .route("/chat/sessions/:id/read", post(chat::handle_mark_read))
        .route("/chat/messages/:id", delete(chat::handle_delete_message))
        .route("/chat/unread", get(chat::handle_unread_count))
        .route("/chat/unread/recent", get(chat::handle_recent_unread))
        .route("/chat/token", post(chat::handle_access_token))
        // Alerts
        .route("/alerts", get(alerts::handle_list_alerts))
        .route("/alerts/:id/read", post(alerts::handle_mark_alert_read))
        .route("/alerts/read-all", post(alerts::handle_mark_all_alerts_read))
        // Admin
        .route("/admin/overview", get(admin::handle_overview))
        .route("/admin/seekers", get(admin::handle_list_seekers))
        .route("/admin/employers", get(admin::handle_list_employers))
        .route("/admin/jobs/:id", delete(admin::handle_delete_job))
}
