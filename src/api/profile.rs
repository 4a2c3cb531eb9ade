use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    crypto::password::hash_password,
    error::Result,
    models::{ApiResponse, GuideDetails, MessageResponse, PublicUser, UserUpdate},
    utils::{non_blank, optional_field, validate_email, validate_password},
};

use super::{require_user, ApiQuery, AppState, JsonOrForm};

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
    pub guides: Vec<GuideDetails>,
}

#[derive(Debug, Deserialize)]
pub struct EditUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

/// GET /api/v1/profile
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<ProfileQuery>,
) -> Result<Json<ApiResponse<ProfileResponse>>> {
    let auth = require_user(&headers, &state).await?;
    let search = non_blank(query.search.as_deref());

    let guides = state
        .db
        .list_user_guides(auth.id(), search.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(ProfileResponse {
        user: PublicUser::from(auth.user),
        guides,
    })))
}

/// POST|PUT /api/v1/profile
pub async fn edit_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(req): JsonOrForm<EditUserRequest>,
) -> Result<Json<ApiResponse<MessageResponse<PublicUser>>>> {
    let auth = require_user(&headers, &state).await?;
    let user_id = auth.id();

    let update = build_user_update(req)?;
    if update.is_empty() {
        return Ok(Json(ApiResponse::success(MessageResponse::new(
            "Nothing to update",
            PublicUser::from(auth.user),
        ))));
    }

    let user = state
        .db
        .update_user(user_id, &update)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                tracing::warn!(
                    "Update attempt with existing username, email, or phone for user {}.",
                    user_id
                );
            }
            e.or_conflict("Username, email, or phone number already exists")
        })?;

    tracing::info!("User {} updated successfully.", user_id);
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "User updated successfully",
        PublicUser::from(user),
    ))))
}

// Validates the supplied fields and hashes a new password if one was given.
fn build_user_update(req: EditUserRequest) -> Result<UserUpdate> {
    let username = optional_field(req.username.as_deref(), "username")?;
    let email = optional_field(req.email.as_deref(), "email")?;
    let phone = optional_field(req.phone.as_deref(), "phone")?;

    if let Some(email) = email.as_deref() {
        validate_email(email)?;
    }

    let password_hash = match req.password.as_deref() {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    Ok(UserUpdate {
        username,
        email,
        phone,
        password_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn request() -> EditUserRequest {
        EditUserRequest {
            username: None,
            email: None,
            phone: None,
            password: None,
        }
    }

    #[test]
    fn empty_request_builds_empty_update() {
        assert!(build_user_update(request()).unwrap().is_empty());
    }

    #[test]
    fn password_is_hashed_not_stored() {
        let update = build_user_update(EditUserRequest {
            password: Some("Secret123".to_string()),
            ..request()
        })
        .unwrap();
        let hash = update.password_hash.unwrap();
        assert_ne!(hash, "Secret123");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn weak_password_and_bad_email_rejected() {
        let err = build_user_update(EditUserRequest {
            password: Some("weak".to_string()),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = build_user_update(EditUserRequest {
            email: Some("nope".to_string()),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn blank_username_rejected() {
        let err = build_user_update(EditUserRequest {
            username: Some("  ".to_string()),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
