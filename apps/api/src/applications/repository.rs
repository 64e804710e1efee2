use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::application::{ApplicationRow, ApplicationStatus, NewApplication};
use crate::repository::RepositoryError;

/// Storage for applications.
///
/// `insert` is an atomic check-and-insert on (job id, lower-cased email) and
/// fails with `RepositoryError::Conflict` on a duplicate.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Whether `email` (case-insensitive) already applied to the job.
    async fn exists(&self, job_id: Uuid, email: &str) -> Result<bool, RepositoryError>;
    async fn insert(&self, new: NewApplication) -> Result<ApplicationRow, RepositoryError>;
    async fn fetch(&self, id: Uuid) -> Result<Option<ApplicationRow>, RepositoryError>;
    async fn for_seeker(&self, seeker_id: Uuid) -> Result<Vec<ApplicationRow>, RepositoryError>;
    async fn for_job(
        &self,
        job_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRow>, RepositoryError>;
    /// Updates the status of an application belonging to `job_id`.
    async fn update_status(
        &self,
        id: Uuid,
        job_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<ApplicationRow>, RepositoryError>;
}

pub struct PgApplicationRepository {
    pool: PgPool,
}

impl PgApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn exists(&self, job_id: Uuid, email: &str) -> Result<bool, RepositoryError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE job_id = $1 AND lower(email) = lower($2))",
        )
        .bind(job_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert(&self, new: NewApplication) -> Result<ApplicationRow, RepositoryError> {
        sqlx::query_as::<_, ApplicationRow>(
            r#"
            INSERT INTO applications
                (id, job_id, seeker_id, name, email, phone, qualification,
                 experience_level, education_level, resume_url, video_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (job_id, lower(email)) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.job_id)
        .bind(new.seeker_id)
        .bind(new.name)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.qualification)
        .bind(new.experience_level)
        .bind(new.education_level)
        .bind(new.resume_url)
        .bind(new.video_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::Conflict)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ApplicationRow>, RepositoryError> {
        Ok(
            sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn for_seeker(&self, seeker_id: Uuid) -> Result<Vec<ApplicationRow>, RepositoryError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE seeker_id = $1 ORDER BY created_at DESC",
        )
        .bind(seeker_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn for_job(
        &self,
        job_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRow>, RepositoryError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT * FROM applications
            WHERE job_id = $1 AND ($2::application_status IS NULL OR status = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(job_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        job_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<ApplicationRow>, RepositoryError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            r#"
            UPDATE applications SET status = $3, updated_at = NOW()
            WHERE id = $1 AND job_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(job_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?)
    }
}
