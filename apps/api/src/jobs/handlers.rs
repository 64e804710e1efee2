use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::accounts::queries::require_employer;
use crate::auth::AuthUser;
use crate::db::PageQuery;
use crate::errors::AppError;
use crate::jobs::matching::{
    candidates_for_job, jobs_for_seeker, tag_recipients, warm_seekers, MatchTier,
};
use crate::jobs::queries::{
    delete_job, insert_job, list_employer_jobs, list_jobs, require_job, require_owned_job,
    update_job, JobFilter,
};
use crate::models::account::{AccountKind, SeekerRow};
use crate::models::job::{JobInput, JobRow};
use crate::notify::Event;
use crate::state::AppState;

const MAX_PER_PAGE: u32 = 100;

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(filter): Query<JobFilter>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let (limit, offset) = crate::db::page_bounds(filter.page, filter.per_page, MAX_PER_PAGE);
    Ok(Json(list_jobs(&state.db, &filter, limit, offset).await?))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    Ok(Json(require_job(&state.db, id).await?))
}

/// POST /api/v1/jobs
///
/// Seekers who are at least a warm match get a job-posted alert, worded by tier.
pub async fn handle_create_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<JobInput>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    let employer_id = user.require(AccountKind::Employer)?;
    let employer = require_employer(&state.db, employer_id).await?;
    let job = insert_job(&state.db, employer.id, input).await?;
    info!("Employer {} posted job {}", employer.id, job.id);

    let candidates = warm_seekers(&state.db, job.id).await?;
    let recipients = tag_recipients(&job, &candidates);
    if !recipients.is_empty() {
        state
            .dispatcher
            .dispatch(Event::JobPosted {
                job: job.clone(),
                employer_name: employer.org_name,
                recipients,
            })
            .await?;
    }

    Ok((StatusCode::CREATED, Json(job)))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<JobInput>,
) -> Result<Json<JobRow>, AppError> {
    let employer_id = user.require(AccountKind::Employer)?;
    require_owned_job(&state.db, id, employer_id).await?;
    Ok(Json(update_job(&state.db, id, input).await?))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let employer_id = user.require(AccountKind::Employer)?;
    require_owned_job(&state.db, id, employer_id).await?;
    delete_job(&state.db, id).await?;
    info!("Employer {employer_id} deleted job {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/employer/jobs
pub async fn handle_employer_jobs(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let employer_id = user.require(AccountKind::Employer)?;
    Ok(Json(list_employer_jobs(&state.db, employer_id).await?))
}

/// GET /api/v1/jobs/matches/:tier
pub async fn handle_seeker_matches(
    State(state): State<AppState>,
    user: AuthUser,
    Path(tier): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let seeker_id = user.require(AccountKind::Seeker)?;
    let tier: MatchTier = tier.parse()?;
    let (limit, offset) = page.bounds(MAX_PER_PAGE);
    Ok(Json(
        jobs_for_seeker(&state.db, seeker_id, tier, limit, offset).await?,
    ))
}

/// GET /api/v1/jobs/:id/candidates/:tier
pub async fn handle_job_candidates(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, tier)): Path<(Uuid, String)>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<SeekerRow>>, AppError> {
    let employer_id = user.require(AccountKind::Employer)?;
    let tier: MatchTier = tier.parse()?;
    require_owned_job(&state.db, id, employer_id).await?;
    let (limit, offset) = page.bounds(MAX_PER_PAGE);
    Ok(Json(
        candidates_for_job(&state.db, id, tier, limit, offset).await?,
    ))
}
