use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::errors::AppError;
use crate::models::application::ApplicationStatus;

const ALL_STATUSES: [ApplicationStatus; 4] = [
    ApplicationStatus::Pending,
    ApplicationStatus::Reviewed,
    ApplicationStatus::Accepted,
    ApplicationStatus::Denied,
];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Totals {
    pub seekers: i64,
    pub employers: i64,
    pub jobs: i64,
    pub applications: i64,
    pub chat_sessions: i64,
    pub chat_messages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    #[serde(flatten)]
    pub totals: Totals,
    pub applications_by_status: BTreeMap<&'static str, i64>,
}

/// Per-status counts with every status present, zero when absent.
pub fn status_breakdown(rows: &[(ApplicationStatus, i64)]) -> BTreeMap<&'static str, i64> {
    let mut breakdown: BTreeMap<&'static str, i64> =
        ALL_STATUSES.iter().map(|s| (s.label(), 0)).collect();
    for (status, count) in rows {
        *breakdown.entry(status.label()).or_insert(0) += count;
    }
    breakdown
}

pub async fn overview(pool: &PgPool) -> Result<Overview, AppError> {
    let totals = sqlx::query_as::<_, Totals>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM seekers) AS seekers,
            (SELECT COUNT(*) FROM employers) AS employers,
            (SELECT COUNT(*) FROM jobs) AS jobs,
            (SELECT COUNT(*) FROM applications) AS applications,
            (SELECT COUNT(*) FROM chat_sessions) AS chat_sessions,
            (SELECT COUNT(*) FROM chat_messages) AS chat_messages
        "#,
    )
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, (ApplicationStatus, i64)>(
        "SELECT status, COUNT(*) FROM applications GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    Ok(Overview {
        totals,
        applications_by_status: status_breakdown(&rows),
    })
}
