use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::accounts::clean_optional;
use crate::errors::AppError;
use crate::models::account::{AccountKind, EmployerRow, SeekerRow};

#[derive(Debug, Clone)]
pub struct NewSeeker {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEmployer {
    pub org_name: String,
    pub domain: Option<String>,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeekerProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployerProfileUpdate {
    pub org_name: Option<String>,
    pub domain: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
}

/// Inserts a seeker; an existing email yields `Conflict`.
pub async fn insert_seeker(pool: &PgPool, new: NewSeeker) -> Result<SeekerRow, AppError> {
    let email = new.email.clone();
    sqlx::query_as::<_, SeekerRow>(
        r#"
        INSERT INTO seekers
            (id, name, email, password_hash, phone, qualification,
             experience_level, education_level, address)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.name)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.phone)
    .bind(new.qualification)
    .bind(new.experience_level)
    .bind(new.education_level)
    .bind(new.address)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict(format!("An account for {email} already exists")))
}

/// Inserts an employer; an existing email yields `Conflict`.
pub async fn insert_employer(pool: &PgPool, new: NewEmployer) -> Result<EmployerRow, AppError> {
    let email = new.email.clone();
    sqlx::query_as::<_, EmployerRow>(
        r#"
        INSERT INTO employers
            (id, org_name, domain, contact_name, email, phone, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.org_name)
    .bind(new.domain)
    .bind(new.contact_name)
    .bind(new.email)
    .bind(new.phone)
    .bind(new.password_hash)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict(format!("An account for {email} already exists")))
}

pub async fn find_seeker(pool: &PgPool, id: Uuid) -> Result<Option<SeekerRow>, AppError> {
    Ok(
        sqlx::query_as::<_, SeekerRow>("SELECT * FROM seekers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn find_seeker_by_email(pool: &PgPool, email: &str) -> Result<Option<SeekerRow>, AppError> {
    Ok(
        sqlx::query_as::<_, SeekerRow>("SELECT * FROM seekers WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn find_employer(pool: &PgPool, id: Uuid) -> Result<Option<EmployerRow>, AppError> {
    Ok(
        sqlx::query_as::<_, EmployerRow>("SELECT * FROM employers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn find_employer_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<EmployerRow>, AppError> {
    Ok(
        sqlx::query_as::<_, EmployerRow>("SELECT * FROM employers WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn require_seeker(pool: &PgPool, id: Uuid) -> Result<SeekerRow, AppError> {
    find_seeker(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Seeker {id} not found")))
}

pub async fn require_employer(pool: &PgPool, id: Uuid) -> Result<EmployerRow, AppError> {
    find_employer(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employer {id} not found")))
}

/// Appends `day` to the seeker's login dates unless it is already recorded.
pub async fn record_login_day(pool: &PgPool, id: Uuid, day: NaiveDate) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE seekers
        SET login_dates = array_append(login_dates, $2)
        WHERE id = $1 AND NOT ($2 = ANY(login_dates))
        "#,
    )
    .bind(id)
    .bind(day)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_seeker_profile(
    pool: &PgPool,
    id: Uuid,
    update: SeekerProfileUpdate,
) -> Result<SeekerRow, AppError> {
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    sqlx::query_as::<_, SeekerRow>(
        r#"
        UPDATE seekers SET
            name = COALESCE($2, name),
            phone = COALESCE($3, phone),
            qualification = COALESCE($4, qualification),
            experience_level = COALESCE($5, experience_level),
            education_level = COALESCE($6, education_level),
            address = COALESCE($7, address)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(clean_optional(update.name))
    .bind(clean_optional(update.phone))
    .bind(clean_optional(update.qualification))
    .bind(clean_optional(update.experience_level))
    .bind(clean_optional(update.education_level))
    .bind(clean_optional(update.address))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Seeker {id} not found")))
}

pub async fn update_employer_profile(
    pool: &PgPool,
    id: Uuid,
    update: EmployerProfileUpdate,
) -> Result<EmployerRow, AppError> {
    for (field, value) in [("org_name", &update.org_name), ("contact_name", &update.contact_name)] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{field} cannot be empty")));
        }
    }
    sqlx::query_as::<_, EmployerRow>(
        r#"
        UPDATE employers SET
            org_name = COALESCE($2, org_name),
            domain = COALESCE($3, domain),
            contact_name = COALESCE($4, contact_name),
            phone = COALESCE($5, phone)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(clean_optional(update.org_name))
    .bind(clean_optional(update.domain))
    .bind(clean_optional(update.contact_name))
    .bind(clean_optional(update.phone))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Employer {id} not found")))
}

/// Stores the URL of an uploaded avatar (seekers) or logo (employers).
pub async fn set_image_url(
    pool: &PgPool,
    kind: AccountKind,
    id: Uuid,
    url: &str,
) -> Result<(), AppError> {
    let sql = match kind {
        AccountKind::Seeker => "UPDATE seekers SET photo_url = $2 WHERE id = $1",
        AccountKind::Employer => "UPDATE employers SET logo_url = $2 WHERE id = $1",
        AccountKind::Admin => return Err(AppError::Forbidden),
    };
    sqlx::query(sql).bind(id).bind(url).execute(pool).await?;
    Ok(())
}

pub async fn set_password_hash(
    pool: &PgPool,
    kind: AccountKind,
    id: Uuid,
    hash: &str,
) -> Result<(), AppError> {
    let sql = match kind {
        AccountKind::Seeker => "UPDATE seekers SET password_hash = $2 WHERE id = $1",
        AccountKind::Employer => "UPDATE employers SET password_hash = $2 WHERE id = $1",
        AccountKind::Admin => return Err(AppError::Forbidden),
    };
    let result = sqlx::query(sql).bind(id).bind(hash).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Account {id} not found")));
    }
    Ok(())
}

pub async fn list_seekers(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<SeekerRow>, AppError> {
    Ok(sqlx::query_as::<_, SeekerRow>(
        "SELECT * FROM seekers ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}

pub async fn list_employers(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<EmployerRow>, AppError> {
    Ok(sqlx::query_as::<_, EmployerRow>(
        "SELECT * FROM employers ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}
