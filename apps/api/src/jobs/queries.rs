use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::accounts::clean_optional;
use crate::errors::AppError;
use crate::models::job::{JobInput, JobRow};

/// Query string accepted by the public job listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub q: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Wraps a search term for `ILIKE`, escaping the pattern metacharacters.
/// Blank terms mean "no filter".
pub fn like_pattern(term: Option<&str>) -> Option<String> {
    let term = term.map(str::trim).filter(|t| !t.is_empty())?;
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    Some(escaped)
}

pub async fn insert_job(pool: &PgPool, employer_id: Uuid, input: JobInput) -> Result<JobRow, AppError> {
    input.validate().map_err(AppError::Validation)?;
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs
            (id, employer_id, title, description, category, salary_min, salary_max,
             location, required_skill, experience_level, education_level, job_type, duration)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(employer_id)
    .bind(input.title.trim())
    .bind(input.description.trim())
    .bind(clean_optional(input.category))
    .bind(input.salary_min)
    .bind(input.salary_max)
    .bind(clean_optional(input.location))
    .bind(clean_optional(input.required_skill))
    .bind(clean_optional(input.experience_level))
    .bind(clean_optional(input.education_level))
    .bind(clean_optional(input.job_type))
    .bind(clean_optional(input.duration))
    .fetch_one(pool)
    .await?)
}

pub async fn find_job(pool: &PgPool, id: Uuid) -> Result<Option<JobRow>, AppError> {
    Ok(sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

pub async fn require_job(pool: &PgPool, id: Uuid) -> Result<JobRow, AppError> {
    find_job(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// Loads a job and checks that `employer_id` posted it.
pub async fn require_owned_job(pool: &PgPool, id: Uuid, employer_id: Uuid) -> Result<JobRow, AppError> {
    let job = require_job(pool, id).await?;
    if job.employer_id != employer_id {
        return Err(AppError::Forbidden);
    }
    Ok(job)
}

/// Replaces every editable field. The caller must already own the job.
pub async fn update_job(pool: &PgPool, id: Uuid, input: JobInput) -> Result<JobRow, AppError> {
    input.validate().map_err(AppError::Validation)?;
    sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            title = $2, description = $3, category = $4, salary_min = $5, salary_max = $6,
            location = $7, required_skill = $8, experience_level = $9, education_level = $10,
            job_type = $11, duration = $12, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.title.trim())
    .bind(input.description.trim())
    .bind(clean_optional(input.category))
    .bind(input.salary_min)
    .bind(input.salary_max)
    .bind(clean_optional(input.location))
    .bind(clean_optional(input.required_skill))
    .bind(clean_optional(input.experience_level))
    .bind(clean_optional(input.education_level))
    .bind(clean_optional(input.job_type))
    .bind(clean_optional(input.duration))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// Deletes a job; its applications go with it.
pub async fn delete_job(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }
    Ok(())
}

pub async fn list_jobs(
    pool: &PgPool,
    filter: &JobFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<JobRow>, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        SELECT * FROM jobs
        WHERE ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1)
          AND ($2::text IS NULL OR category ILIKE $2)
          AND ($3::text IS NULL OR location ILIKE $3)
        ORDER BY created_at DESC, id
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(like_pattern(filter.q.as_deref()))
    .bind(like_pattern(filter.category.as_deref()))
    .bind(like_pattern(filter.location.as_deref()))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}

pub async fn list_employer_jobs(pool: &PgPool, employer_id: Uuid) -> Result<Vec<JobRow>, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        "SELECT * FROM jobs WHERE employer_id = $1 ORDER BY created_at DESC",
    )
    .bind(employer_id)
    .fetch_all(pool)
    .await?)
}
