use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::alert::AlertRow;
use crate::state::AppState;

const DEFAULT_ALERT_LIMIT: i64 = 50;
const MAX_ALERT_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct AlertQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct MarkedResponse {
    pub updated: u64,
}

/// GET /api/v1/alerts
pub async fn handle_list_alerts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<AlertRow>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ALERT_LIMIT)
        .clamp(1, MAX_ALERT_LIMIT);
    Ok(Json(
        state
            .alerts
            .list(user.party()?, query.unread_only, limit)
            .await?,
    ))
}

/// POST /api/v1/alerts/:id/read
pub async fn handle_mark_alert_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.alerts.mark_read(id, user.party()?).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Alert {id} not found")))
    }
}

/// POST /api/v1/alerts/read-all
pub async fn handle_mark_all_alerts_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MarkedResponse>, AppError> {
    Ok(Json(MarkedResponse {
        updated: state.alerts.mark_all_read(user.party()?).await?,
    }))
}
