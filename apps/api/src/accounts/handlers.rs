use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::accounts::queries::{
    require_employer, require_seeker, set_image_url, update_employer_profile,
    update_seeker_profile, EmployerProfileUpdate, SeekerProfileUpdate,
};
use crate::accounts::Profile;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::account::AccountKind;
use crate::state::AppState;
use crate::storage::{object_key, MultipartForm};

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Serialize)]
pub struct ImageResponse {
    pub url: String,
}

async fn load_profile(state: &AppState, user: &AuthUser) -> Result<Profile, AppError> {
    Ok(match user.kind {
        AccountKind::Seeker => Profile::Seeker(require_seeker(&state.db, user.id).await?),
        AccountKind::Employer => Profile::Employer(require_employer(&state.db, user.id).await?),
        AccountKind::Admin => Profile::Admin {
            email: state.config.admin.email.clone(),
        },
    })
}

/// GET /api/v1/me
pub async fn handle_get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(load_profile(&state, &user).await?))
}

/// PUT /api/v1/me
///
/// The body shape depends on the caller's account kind. Omitted fields keep their value.
pub async fn handle_update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Json<Profile>, AppError> {
    let invalid = |e: serde_json::Error| AppError::Validation(format!("Invalid profile update: {e}"));
    let profile = match user.kind {
        AccountKind::Seeker => {
            let update: SeekerProfileUpdate = serde_json::from_value(body).map_err(invalid)?;
            Profile::Seeker(update_seeker_profile(&state.db, user.id, update).await?)
        }
        AccountKind::Employer => {
            let update: EmployerProfileUpdate = serde_json::from_value(body).map_err(invalid)?;
            Profile::Employer(update_employer_profile(&state.db, user.id, update).await?)
        }
        AccountKind::Admin => return Err(AppError::Forbidden),
    };
    Ok(Json(profile))
}

/// POST /api/v1/me/photo
///
/// Multipart with an `image` file: the seeker's photo or the employer's logo.
pub async fn handle_upload_photo(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<ImageResponse>, AppError> {
    let party = user.party()?;
    let mut form = MultipartForm::read(multipart).await?;
    let image = form
        .take_file("image")
        .ok_or_else(|| AppError::Validation("Missing 'image' file part".to_string()))?;
    if !image.content_type.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "Expected an image, got {}",
            image.content_type
        )));
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation("Image exceeds the 5MB limit".to_string()));
    }

    let prefix = format!("images/{}", party.kind.as_str());
    let key = object_key(&prefix, image.file_name.as_deref());
    let url = state
        .files
        .put(&key, image.bytes.to_vec(), &image.content_type)
        .await?;
    set_image_url(&state.db, party.kind, party.id, &url).await?;

    Ok(Json(ImageResponse { url }))
}
