use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::queries::{
    find_employer_by_email, find_seeker_by_email, insert_employer, insert_seeker,
    record_login_day, set_password_hash, NewEmployer, NewSeeker,
};
use crate::accounts::{clean_optional, normalize_email, Profile};
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::reset::{consume_reset, create_reset, reset_link};
use crate::auth::token::IssuedToken;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::account::AccountKind;
use crate::notify::mail::password_reset_mail;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterSeekerRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterEmployerRequest {
    pub org_name: String,
    pub domain: Option<String>,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub profile: Profile,
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

/// Lower-cased lookup key for login; malformed input simply finds nobody.
fn login_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// POST /api/v1/auth/seeker/register
pub async fn handle_register_seeker(
    State(state): State<AppState>,
    Json(req): Json<RegisterSeekerRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;
    let seeker = insert_seeker(
        &state.db,
        NewSeeker {
            name: required("name", &req.name)?,
            email,
            password_hash: hash_password(&req.password)?,
            phone: clean_optional(req.phone),
            qualification: clean_optional(req.qualification),
            experience_level: clean_optional(req.experience_level),
            education_level: clean_optional(req.education_level),
            address: clean_optional(req.address),
        },
    )
    .await?;
    info!("Registered seeker {}", seeker.id);

    let token = state.tokens.issue(AccountKind::Seeker, seeker.id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            profile: Profile::Seeker(seeker),
        }),
    ))
}

/// POST /api/v1/auth/employer/register
pub async fn handle_register_employer(
    State(state): State<AppState>,
    Json(req): Json<RegisterEmployerRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;
    let employer = insert_employer(
        &state.db,
        NewEmployer {
            org_name: required("org_name", &req.org_name)?,
            domain: clean_optional(req.domain),
            contact_name: required("contact_name", &req.contact_name)?,
            email,
            phone: clean_optional(req.phone),
            password_hash: hash_password(&req.password)?,
        },
    )
    .await?;
    info!("Registered employer {} ({})", employer.id, employer.org_name);

    let token = state.tokens.issue(AccountKind::Employer, employer.id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            profile: Profile::Employer(employer),
        }),
    ))
}

/// POST /api/v1/auth/seeker/login
///
/// Records today's date in the seeker's login history (at most once per day).
pub async fn handle_seeker_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let mut seeker = find_seeker_by_email(&state.db, &login_email(&req.email))
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !verify_password(&req.password, &seeker.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let today = Utc::now().date_naive();
    record_login_day(&state.db, seeker.id, today).await?;
    if !seeker.login_dates.contains(&today) {
        seeker.login_dates.push(today);
    }

    let token = state.tokens.issue(AccountKind::Seeker, seeker.id)?;
    Ok(Json(AuthResponse {
        token,
        profile: Profile::Seeker(seeker),
    }))
}

/// POST /api/v1/auth/employer/login
pub async fn handle_employer_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let employer = find_employer_by_email(&state.db, &login_email(&req.email))
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !verify_password(&req.password, &employer.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = state.tokens.issue(AccountKind::Employer, employer.id)?;
    Ok(Json(AuthResponse {
        token,
        profile: Profile::Employer(employer),
    }))
}

/// POST /api/v1/auth/admin/login
///
/// Checked against the configured admin identity; there is no admin table.
pub async fn handle_admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let admin = &state.config.admin;
    if login_email(&req.email) != admin.email || !verify_password(&req.password, &admin.password_hash)? {
        warn!("Failed admin login attempt");
        return Err(AppError::Unauthorized);
    }

    let token = state.tokens.issue(AccountKind::Admin, Uuid::nil())?;
    Ok(Json(AuthResponse {
        token,
        profile: Profile::Admin {
            email: admin.email.clone(),
        },
    }))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<StatusCode, AppError> {
    state.revocations.revoke(&user.claims).await?;
    info!("Revoked token {} for {} {}", user.claims.jti, user.kind.as_str(), user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn request_reset(state: &AppState, kind: AccountKind, raw_email: &str) -> Result<StatusCode, AppError> {
    let email = login_email(raw_email);
    let account = match kind {
        AccountKind::Seeker => find_seeker_by_email(&state.db, &email)
            .await?
            .map(|s| (s.id, s.name)),
        AccountKind::Employer => find_employer_by_email(&state.db, &email)
            .await?
            .map(|e| (e.id, e.contact_name)),
        AccountKind::Admin => None,
    };

    // Same answer whether or not the account exists.
    if let Some((id, name)) = account {
        let token = create_reset(&state.db, kind, id).await?;
        let link = reset_link(&state.config.app_base_url, &token);
        state
            .dispatcher
            .send_mail(password_reset_mail(&name, &email, &link))
            .await;
        info!("Issued password reset for {} {id}", kind.as_str());
    }
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/auth/seeker/password/forgot
pub async fn handle_seeker_forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    request_reset(&state, AccountKind::Seeker, &req.email).await
}

/// POST /api/v1/auth/employer/password/forgot
pub async fn handle_employer_forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    request_reset(&state, AccountKind::Employer, &req.email).await
}

/// POST /api/v1/auth/password/reset
pub async fn handle_reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate_password(&req.password)?;
    let (kind, id) = consume_reset(&state.db, &req.token).await?;
    set_password_hash(&state.db, kind, id, &hash_password(&req.password)?).await?;
    info!("Password reset completed for {} {id}", kind.as_str());
    Ok(StatusCode::NO_CONTENT)
}
