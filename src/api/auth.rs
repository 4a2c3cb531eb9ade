use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    constants::SESSION_COOKIE_NAME,
    crypto::{
        hash::token_digest,
        password::{hash_password, verify_password},
        token::generate_token,
    },
    error::{AppError, Result},
    models::{ApiResponse, MessageResponse, PublicUser, Session, User},
    utils::{ensure_max_length, non_blank, validate_email, validate_password},
};

use super::{require_user, AppState, JsonOrForm};

// ==================== REQUEST/RESPONSE TYPES ====================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub expires_in: i64,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub identifier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetRequestResponse {
    pub message: String,
    pub reset_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub reset_token: Option<String>,
    pub new_password: Option<String>,
}

/// JWT claims. `sid` is the raw session token; only its digest is stored server-side.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub sid: String,
    pub exp: usize,
    pub iat: usize,
}

// ==================== HANDLERS ====================

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse<PublicUser>>>)> {
    let (Some(username), Some(email), Some(phone), Some(password)) = (
        non_blank(req.username.as_deref()),
        non_blank(req.email.as_deref()),
        non_blank(req.phone.as_deref()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        tracing::warn!("Registration attempt with missing fields.");
        return Err(AppError::BadRequest(
            "Username, email, phone, and password are required".to_string(),
        ));
    };

    ensure_max_length(&username, "username")?;
    ensure_max_length(&phone, "phone")?;
    validate_email(&email)?;
    validate_password(&password)?;

    let password_hash = hash_password(&password)?;
    let user = state
        .db
        .create_user(&username, &email, &phone, &password_hash)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                tracing::warn!(
                    "Registration attempt with existing username, email, or phone: {}, {}, {}.",
                    username,
                    email,
                    phone
                );
            }
            e.or_conflict("Username, email, or phone number already exists")
        })?;

    tracing::info!("User {} registered successfully.", user.username);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(MessageResponse::new(
            "User registered successfully",
            PublicUser::from(user),
        ))),
    ))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<LoginRequest>,
) -> Result<(HeaderMap, Json<ApiResponse<LoginResponse>>)> {
    let (Some(identifier), Some(password)) = (
        non_blank(req.identifier.as_deref()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        tracing::warn!("Login attempt with missing fields.");
        return Err(AppError::BadRequest(
            "Identifier and password are required".to_string(),
        ));
    };

    let user = match state.db.find_user_by_identifier(&identifier).await? {
        Some(user) if verify_password(&password, &user.password_hash) => user,
        _ => {
            tracing::warn!("Invalid login attempt for identifier: {}.", identifier);
            return Err(AppError::AuthError(
                "Invalid identifier or password".to_string(),
            ));
        }
    };

    let (jwt, expires_in) = start_session(&state, &user).await?;
    tracing::info!("User {} logged in successfully.", identifier);

    Ok((
        cookie_headers(&session_cookie(&jwt, expires_in))?,
        Json(ApiResponse::success(LoginResponse {
            message: "Login successful".to_string(),
            token: jwt,
            expires_in,
            user: PublicUser::from(user),
        })),
    ))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<ApiResponse<MessageResponse<()>>>)> {
    let auth = require_user(&headers, &state).await?;
    state.db.delete_session(&auth.session_digest()).await?;

    tracing::info!("User {} logged out successfully.", auth.id());
    Ok((
        cookie_headers(&clear_session_cookie())?,
        Json(ApiResponse::success(MessageResponse::message_only(
            "You have been logged out",
        ))),
    ))
}

/// POST /api/v1/auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<ApiResponse<LoginResponse>>)> {
    let auth = require_user(&headers, &state).await?;

    let expires_in = state.config.session_lifetime_secs();
    let expires_at = Utc::now() + Duration::seconds(expires_in);
    if !state
        .db
        .extend_session(&auth.session_digest(), expires_at)
        .await?
    {
        return Err(AppError::AuthError(
            "Session expired or revoked".to_string(),
        ));
    }

    let jwt = generate_session_jwt(
        auth.id(),
        &auth.session_token,
        &state.config.jwt_secret,
        expires_in,
    )?;

    tracing::debug!("Session refreshed for user {}", auth.id());
    Ok((
        cookie_headers(&session_cookie(&jwt, expires_in))?,
        Json(ApiResponse::success(LoginResponse {
            message: "Session refreshed".to_string(),
            token: jwt,
            expires_in,
            user: PublicUser::from(auth.user),
        })),
    ))
}

/// POST /api/v1/auth/password-reset/request
pub async fn request_password_reset(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<ResetRequest>,
) -> Result<Json<ApiResponse<ResetRequestResponse>>> {
    let identifier = non_blank(req.identifier.as_deref())
        .ok_or_else(|| AppError::BadRequest("Identifier is required".to_string()))?;

    let user = state
        .db
        .find_user_by_identifier(&identifier)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let reset_token = generate_token();
    state
        .db
        .set_reset_token(user.id, &token_digest(&reset_token))
        .await?;

    tracing::info!("Password reset token generated for user {}.", user.id);
    Ok(Json(ApiResponse::success(ResetRequestResponse {
        message: "Password reset token generated".to_string(),
        reset_token,
    })))
}

/// POST /api/v1/auth/password-reset/confirm
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<ResetConfirmRequest>,
) -> Result<Json<ApiResponse<MessageResponse<()>>>> {
    let (Some(reset_token), Some(new_password)) = (
        non_blank(req.reset_token.as_deref()),
        req.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Reset token and new password are required".to_string(),
        ));
    };
    validate_password(&new_password)?;

    let password_hash = hash_password(&new_password)?;
    let user_id = state
        .db
        .consume_reset_token(&token_digest(&reset_token), &password_hash)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Password reset attempted with an unknown token.");
            AppError::BadRequest("Invalid reset token".to_string())
        })?;

    let revoked = state.db.delete_user_sessions(user_id).await?;
    tracing::info!(
        "Password reset for user {} ({} session(s) revoked).",
        user_id,
        revoked
    );

    Ok(Json(ApiResponse::success(MessageResponse::message_only(
        "Password reset successful",
    ))))
}

// ==================== HELPER FUNCTIONS ====================

/// Creates a fresh server-side session for `user` and wraps it in a signed JWT.
/// Returns the JWT and its lifetime in seconds.
async fn start_session(state: &AppState, user: &User) -> Result<(String, i64)> {
    let session_token = generate_token();
    let lifetime = state.config.session_lifetime_secs();
    let now = Utc::now();

    state
        .db
        .create_session(&Session {
            token_digest: token_digest(&session_token),
            user_id: user.id,
            created_at: now,
            expires_at: now + Duration::seconds(lifetime),
        })
        .await?;

    let jwt = generate_session_jwt(user.id, &session_token, &state.config.jwt_secret, lifetime)?;
    Ok((jwt, lifetime))
}

fn generate_session_jwt(
    user_id: i64,
    session_token: &str,
    secret: &str,
    lifetime_secs: i64,
) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        sid: session_token.to_string(),
        exp: (now + Duration::seconds(lifetime_secs)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

pub fn decode_session_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))?;

    Ok(token_data.claims)
}

fn session_cookie(jwt: &str, max_age: i64) -> String {
    format!("{SESSION_COOKIE_NAME}={jwt}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn cookie_headers(cookie: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::Internal(format!("Invalid cookie value: {}", e)))?;
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_jwt_round_trips_claims() {
        let jwt = generate_session_jwt(42, "raw-session", "secret", 3600).unwrap();
        let claims = decode_session_jwt(&jwt, "secret").unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.sid, "raw-session");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn session_jwt_rejects_wrong_secret() {
        let jwt = generate_session_jwt(1, "sid", "secret", 3600).unwrap();
        let err = decode_session_jwt(&jwt, "other").unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[test]
    fn expired_session_jwt_is_rejected() {
        // Well past the validator's default leeway
        let jwt = generate_session_jwt(1, "sid", "secret", -3600).unwrap();
        assert!(decode_session_jwt(&jwt, "secret").is_err());
    }

    #[test]
    fn cookies_are_http_only() {
        let cookie = session_cookie("abc", 60);
        assert!(cookie.starts_with("session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
