use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::queries::{require_employer, require_seeker};
use crate::applications::service::{can_view, ApplicationFiles, Attachment};
use crate::applications::upload::{UploadKey, UploadKind};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::jobs::queries::{require_job, require_owned_job};
use crate::models::account::AccountKind;
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::state::AppState;
use crate::storage::{MultipartForm, UploadedFile};

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub job_id: Uuid,
}

#[derive(Deserialize)]
pub struct CompleteUploadRequest {
    pub job_id: Uuid,
    pub resume_file_name: Option<String>,
    pub video_file_name: Option<String>,
}

#[derive(Serialize)]
pub struct ChunkReceipt {
    pub kind: &'static str,
    pub index: u32,
    pub total: u32,
    pub received: u32,
}

#[derive(Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

fn parse_status(raw: &str) -> Result<ApplicationStatus, AppError> {
    raw.parse().map_err(AppError::Validation)
}

fn attachment(kind: UploadKind, file: UploadedFile) -> Attachment {
    Attachment {
        kind,
        file_name: file.file_name,
        content_type: file.content_type,
        bytes: file.bytes.to_vec(),
    }
}

/// POST /api/v1/applications
///
/// Applies with the profile alone, no attachments.
pub async fn handle_apply(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<ApplicationRow>), AppError> {
    let seeker = require_seeker(&state.db, user.require(AccountKind::Seeker)?).await?;
    let job = require_job(&state.db, req.job_id).await?;
    let application = state
        .applications
        .apply(&job, &seeker, ApplicationFiles::default())
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// POST /api/v1/applications/upload
///
/// Multipart: `job_id`, `resume` file, optional `video` file.
pub async fn handle_apply_with_files(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApplicationRow>), AppError> {
    let seeker = require_seeker(&state.db, user.require(AccountKind::Seeker)?).await?;
    let mut form = MultipartForm::read(multipart).await?;
    let job = require_job(&state.db, form.parse("job_id")?).await?;

    let resume = form
        .take_file("resume")
        .ok_or_else(|| AppError::Validation("A resume file is required".to_string()))?;
    let mut attachments = vec![attachment(UploadKind::Resume, resume)];
    if let Some(video) = form.take_file("video") {
        attachments.push(attachment(UploadKind::Video, video));
    }

    let application = state
        .applications
        .apply_with_attachments(&job, &seeker, attachments)
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// POST /api/v1/applications/chunks
///
/// Multipart: `job_id`, `kind` (resume | video), `index`, `total`, `chunk` file.
pub async fn handle_upload_chunk(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<ChunkReceipt>, AppError> {
    let seeker_id = user.require(AccountKind::Seeker)?;
    let mut form = MultipartForm::read(multipart).await?;
    let job = require_job(&state.db, form.parse("job_id")?).await?;
    let kind: UploadKind = form.text("kind")?.parse()?;
    let index: u32 = form.parse("index")?;
    let total: u32 = form.parse("total")?;
    let chunk = form
        .take_file("chunk")
        .ok_or_else(|| AppError::Validation("Missing 'chunk' file part".to_string()))?;

    let key = UploadKey {
        seeker_id,
        job_id: job.id,
        kind,
    };
    let received = state
        .chunks
        .write_chunk(&key, index, total, &chunk.bytes)
        .await?;

    Ok(Json(ChunkReceipt {
        kind: kind.as_str(),
        index,
        total,
        received,
    }))
}

/// POST /api/v1/applications/chunks/complete
///
/// Assembles the staged resume (required) and video (optional), stores them, then applies.
pub async fn handle_complete_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CompleteUploadRequest>,
) -> Result<(StatusCode, Json<ApplicationRow>), AppError> {
    let seeker = require_seeker(&state.db, user.require(AccountKind::Seeker)?).await?;
    let job = require_job(&state.db, req.job_id).await?;
    let application = state
        .applications
        .apply_from_staged(
            &state.chunks,
            &job,
            &seeker,
            req.resume_file_name.as_deref(),
            req.video_file_name.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/applications/mine
pub async fn handle_my_applications(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ApplicationRow>>, AppError> {
    let seeker_id = user.require(AccountKind::Seeker)?;
    Ok(Json(state.applications.for_seeker(seeker_id).await?))
}

/// GET /api/v1/jobs/:id/applications
pub async fn handle_job_applications(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<Uuid>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<ApplicationRow>>, AppError> {
    let employer_id = user.require(AccountKind::Employer)?;
    let status = filter.status.as_deref().map(parse_status).transpose()?;
    let job = require_job(&state.db, job_id).await?;
    Ok(Json(
        state.applications.for_job(&job, employer_id, status).await?,
    ))
}

/// GET /api/v1/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationRow>, AppError> {
    let application = state.applications.get(id).await?;
    let job = require_job(&state.db, application.job_id).await?;
    if !can_view(&application, &job, user.party()?) {
        return Err(AppError::Forbidden);
    }
    Ok(Json(application))
}

/// PATCH /api/v1/applications/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<ApplicationRow>, AppError> {
    let employer = require_employer(&state.db, user.require(AccountKind::Employer)?).await?;
    let status = parse_status(&req.status)?;
    let application = state.applications.get(id).await?;
    let job = require_owned_job(&state.db, application.job_id, employer.id).await?;
    Ok(Json(
        state
            .applications
            .update_status(id, &job, &employer, status)
            .await?,
    ))
}
