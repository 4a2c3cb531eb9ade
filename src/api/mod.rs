// src/api/mod.rs

pub mod auth;
pub mod games;
pub mod guides;
pub mod health;
pub mod home;
pub mod profile;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE},
        request::Parts,
        HeaderMap,
    },
    Form, Json,
};
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::constants::SESSION_COOKIE_NAME;
use crate::crypto::hash::token_digest;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::User;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

/// The caller behind a valid session.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// Raw session token carried inside the JWT
    pub session_token: String,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn session_digest(&self) -> String {
        token_digest(&self.session_token)
    }
}

/// Login-required gate shared by every protected handler.
pub async fn require_user(headers: &HeaderMap, state: &AppState) -> Result<AuthUser> {
    let jwt = session_jwt_from_headers(headers)
        .ok_or_else(|| AppError::AuthError("Login required".to_string()))?;

    let claims = auth::decode_session_jwt(&jwt, &state.config.jwt_secret)?;
    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))?;

    let digest = token_digest(&claims.sid);
    let session = state
        .db
        .get_session(&digest)
        .await?
        .ok_or_else(|| AppError::AuthError("Session expired or revoked".to_string()))?;

    if session.user_id != user_id {
        tracing::warn!("Session {} presented for foreign user {}", &digest[..8], user_id);
        return Err(AppError::AuthError("Session expired or revoked".to_string()));
    }
    if session.is_expired(Utc::now()) {
        state.db.delete_session(&digest).await?;
        return Err(AppError::AuthError("Session expired or revoked".to_string()));
    }

    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))?;

    Ok(AuthUser {
        user,
        session_token: claims.sid,
    })
}

/// Bearer header wins over the session cookie.
fn session_jwt_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Accepts either a JSON body or an urlencoded form, picked by `Content-Type`.
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(value))
        }
    }
}

/// `Path` whose rejection renders as an [`AppError`].
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection renders as an [`AppError`].
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_is_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(COOKIE, HeaderValue::from_static("session=xyz"));
        assert_eq!(session_jwt_from_headers(&headers), Some("abc".to_string()));
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=xyz; lang=en"));
        assert_eq!(session_jwt_from_headers(&headers), Some("xyz".to_string()));
    }

    #[test]
    fn missing_credentials_yield_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_jwt_from_headers(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        headers.insert(COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_jwt_from_headers(&headers), None);
    }
}
