use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    constants::API_VERSION,
    error::Result,
    models::{ApiResponse, Game, GuideDetails},
};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub games: Vec<Game>,
    pub guides: Vec<GuideDetails>,
    pub top_guides: Vec<GuideDetails>,
}

#[derive(Debug, Serialize)]
pub struct HelpEntry {
    pub method: &'static str,
    pub path: &'static str,
    pub login_required: bool,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HelpResponse {
    pub version: &'static str,
    pub featured_game: String,
    pub endpoints: Vec<HelpEntry>,
}

const ENDPOINTS: &[(&str, &str, bool, &str)] = &[
    ("GET", "/api/v1/", false, "Games, guides and the most used guides"),
    ("GET", "/api/v1/help", false, "This page"),
    ("POST", "/api/v1/auth/register", false, "Create an account"),
    ("POST", "/api/v1/auth/login", false, "Log in with username, email or phone"),
    ("POST", "/api/v1/auth/logout", true, "End the current session"),
    ("POST", "/api/v1/auth/refresh", true, "Extend the current session"),
    ("POST", "/api/v1/auth/password-reset/request", false, "Get a password reset token"),
    ("POST", "/api/v1/auth/password-reset/confirm", false, "Set a new password with a reset token"),
    ("GET", "/api/v1/profile", true, "Your account and guides, ?search= filters by title"),
    ("PUT", "/api/v1/profile", true, "Change username, email, phone or password"),
    ("GET", "/api/v1/games", false, "All games"),
    ("GET", "/api/v1/games/{id}", false, "One game with its guides"),
    ("POST", "/api/v1/games", true, "Add a game"),
    ("PUT", "/api/v1/games/{id}", true, "Rename a game"),
    ("DELETE", "/api/v1/games/{id}", true, "Delete a game without guides"),
    ("GET", "/api/v1/guides", false, "All guides, paged"),
    ("GET", "/api/v1/guides/featured", false, "Guides for the featured game"),
    ("GET", "/api/v1/guides/other", false, "Guides for every other game"),
    ("GET", "/api/v1/guides/{id}", true, "Read a guide"),
    ("POST", "/api/v1/guides", true, "Publish a guide"),
    ("PUT", "/api/v1/guides/{id}", true, "Edit one of your guides"),
    ("DELETE", "/api/v1/guides/{id}", true, "Delete one of your guides"),
];

/// GET /api/v1/
pub async fn index(State(state): State<AppState>) -> Result<Json<ApiResponse<IndexResponse>>> {
    let games = state.db.list_games().await?;
    let guides = state.db.list_all_guides().await?;
    let top_guides = state
        .db
        .top_guides(i64::from(state.config.top_guides_limit))
        .await?;

    Ok(Json(ApiResponse::success(IndexResponse {
        games,
        guides,
        top_guides,
    })))
}

/// GET /api/v1/help
pub async fn help(State(state): State<AppState>) -> Json<ApiResponse<HelpResponse>> {
    let endpoints = ENDPOINTS
        .iter()
        .map(|&(method, path, login_required, description)| HelpEntry {
            method,
            path,
            login_required,
            description,
        })
        .collect();

    Json(ApiResponse::success(HelpResponse {
        version: API_VERSION,
        featured_game: state.config.featured_game.clone(),
        endpoints,
    }))
}
