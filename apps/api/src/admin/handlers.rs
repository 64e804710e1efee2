use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::accounts::queries::{list_employers, list_seekers};
use crate::admin::queries::{overview, Overview};
use crate::auth::AuthUser;
use crate::db::PageQuery;
use crate::errors::AppError;
use crate::jobs::queries::delete_job;
use crate::models::account::{AccountKind, EmployerRow, SeekerRow};
use crate::state::AppState;

const MAX_PER_PAGE: u32 = 200;

/// GET /api/v1/admin/overview
pub async fn handle_overview(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Overview>, AppError> {
    user.require(AccountKind::Admin)?;
    Ok(Json(overview(&state.db).await?))
}

/// GET /api/v1/admin/seekers
pub async fn handle_list_seekers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<SeekerRow>>, AppError> {
    user.require(AccountKind::Admin)?;
    let (limit, offset) = page.bounds(MAX_PER_PAGE);
    Ok(Json(list_seekers(&state.db, limit, offset).await?))
}

/// GET /api/v1/admin/employers
pub async fn handle_list_employers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<EmployerRow>>, AppError> {
    user.require(AccountKind::Admin)?;
    let (limit, offset) = page.bounds(MAX_PER_PAGE);
    Ok(Json(list_employers(&state.db, limit, offset).await?))
}

/// DELETE /api/v1/admin/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(AccountKind::Admin)?;
    delete_job(&state.db, id).await?;
    info!("Admin deleted job {id}");
    Ok(StatusCode::NO_CONTENT)
}
