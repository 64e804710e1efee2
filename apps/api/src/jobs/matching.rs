//! Hot / warm candidate matching.
//!
//! A job and a seeker are compared on three pairs of fields: required skill vs
//! qualification, experience level, and education level. `hot` needs all three
//! equal, `warm` needs at least one. A missing value on either side never matches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::{Party, SeekerRow};
use crate::models::job::JobRow;

/// (job column, seeker column)
const MATCHED_FIELDS: [(&str, &str); 3] = [
    ("required_skill", "qualification"),
    ("experience_level", "experience_level"),
    ("education_level", "education_level"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Hot,
    Warm,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchTier::Hot => "hot",
            MatchTier::Warm => "warm",
        })
    }
}

impl FromStr for MatchTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(MatchTier::Hot),
            "warm" => Ok(MatchTier::Warm),
            other => Err(AppError::Validation(format!(
                "match tier must be 'hot' or 'warm', got '{other}'"
            ))),
        }
    }
}

/// SQL predicate comparing `job_alias` to `seeker_alias` for the tier.
/// SQL equality with NULL is never true, which gives the "missing never matches" rule.
pub fn match_predicate(tier: MatchTier, job_alias: &str, seeker_alias: &str) -> String {
    let joiner = match tier {
        MatchTier::Hot => " AND ",
        MatchTier::Warm => " OR ",
    };
    let clauses: Vec<String> = MATCHED_FIELDS
        .iter()
        .map(|(job_col, seeker_col)| format!("{job_alias}.{job_col} = {seeker_alias}.{seeker_col}"))
        .collect();
    format!("({})", clauses.join(joiner))
}

fn field_matches(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// The best tier the pair reaches, if any.
pub fn tier_of(job: &JobRow, seeker: &SeekerRow) -> Option<MatchTier> {
    let hits = [
        field_matches(job.required_skill.as_deref(), seeker.qualification.as_deref()),
        field_matches(job.experience_level.as_deref(), seeker.experience_level.as_deref()),
        field_matches(job.education_level.as_deref(), seeker.education_level.as_deref()),
    ];
    match hits.iter().filter(|hit| **hit).count() {
        3 => Some(MatchTier::Hot),
        0 => None,
        _ => Some(MatchTier::Warm),
    }
}

/// Jobs matching the seeker's profile, newest first.
pub async fn jobs_for_seeker(
    pool: &PgPool,
    seeker_id: Uuid,
    tier: MatchTier,
    limit: i64,
    offset: i64,
) -> Result<Vec<JobRow>, AppError> {
    let sql = format!(
        "SELECT j.* FROM jobs j JOIN seekers s ON s.id = $1 \
         WHERE {} ORDER BY j.created_at DESC, j.id LIMIT $2 OFFSET $3",
        match_predicate(tier, "j", "s")
    );
    Ok(sqlx::query_as::<_, JobRow>(&sql)
        .bind(seeker_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?)
}

/// Seekers matching one job, most recent registrations first.
pub async fn candidates_for_job(
    pool: &PgPool,
    job_id: Uuid,
    tier: MatchTier,
    limit: i64,
    offset: i64,
) -> Result<Vec<SeekerRow>, AppError> {
    let sql = format!(
        "SELECT s.* FROM seekers s JOIN jobs j ON j.id = $1 \
         WHERE {} ORDER BY s.created_at DESC, s.id LIMIT $2 OFFSET $3",
        match_predicate(tier, "j", "s")
    );
    Ok(sqlx::query_as::<_, SeekerRow>(&sql)
        .bind(job_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?)
}

/// Seekers at least warm for the job, used for job-posted alerts.
pub async fn warm_seekers(pool: &PgPool, job_id: Uuid) -> Result<Vec<SeekerRow>, AppError> {
    let sql = format!(
        "SELECT s.* FROM seekers s JOIN jobs j ON j.id = $1 WHERE {}",
        match_predicate(MatchTier::Warm, "j", "s")
    );
    Ok(sqlx::query_as::<_, SeekerRow>(&sql)
        .bind(job_id)
        .fetch_all(pool)
        .await?)
}

/// Pairs each seeker with the tier they reach for `job`, dropping non-matches.
pub fn tag_recipients(job: &JobRow, seekers: &[SeekerRow]) -> Vec<(Party, MatchTier)> {
    seekers
        .iter()
        .filter_map(|seeker| tier_of(job, seeker).map(|tier| (Party::seeker(seeker.id), tier)))
        .collect()
}
