use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::{ApiResponse, Game, GameWithGuides, MessageResponse},
    utils::{ensure_max_length, non_blank},
};

use super::{require_user, ApiPath, AppState, JsonOrForm};

#[derive(Debug, Deserialize)]
pub struct GameRequest {
    pub game_name: Option<String>,
}

/// GET /api/v1/games
pub async fn list_games(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Game>>>> {
    let games = state.db.list_games().await?;
    Ok(Json(ApiResponse::success(games)))
}

/// GET /api/v1/games/{id}
pub async fn get_game(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<GameWithGuides>>> {
    let game = state
        .db
        .get_game(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Game with ID {} not found.", id)))?;
    let guides = state.db.list_game_guides(game.id).await?;

    Ok(Json(ApiResponse::success(GameWithGuides { game, guides })))
}

/// POST /api/v1/games
pub async fn add_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(req): JsonOrForm<GameRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse<Game>>>)> {
    let auth = require_user(&headers, &state).await?;
    let name = parse_game_name(req)?;

    if state.db.get_game_by_name(&name).await?.is_some() {
        tracing::warn!("Game addition attempt for existing game: {}.", name);
        return Err(AppError::Conflict("Game already exists".to_string()));
    }

    let game = state
        .db
        .create_game(&name)
        .await
        .map_err(|e| e.or_conflict("Game already exists"))?;

    tracing::info!("New game {} added successfully by user {}.", name, auth.id());
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(MessageResponse::new(
            "New game added successfully",
            game,
        ))),
    ))
}

/// PUT /api/v1/games/{id}
pub async fn rename_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
    JsonOrForm(req): JsonOrForm<GameRequest>,
) -> Result<Json<ApiResponse<MessageResponse<Game>>>> {
    let auth = require_user(&headers, &state).await?;
    let name = parse_game_name(req)?;

    let game = state
        .db
        .rename_game(id, &name)
        .await
        .map_err(|e| e.or_conflict("Game already exists"))?
        .ok_or_else(|| AppError::NotFound(format!("Game with ID {} not found.", id)))?;

    tracing::info!("Game {} renamed to {} by user {}.", id, name, auth.id());
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Game updated successfully",
        game,
    ))))
}

/// DELETE /api/v1/games/{id}
pub async fn delete_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MessageResponse<()>>>> {
    let auth = require_user(&headers, &state).await?;

    let game = state
        .db
        .get_game(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Game with ID {} not found.", id)))?;

    let guide_count = state.db.count_game_guides(game.id).await?;
    if guide_count > 0 {
        tracing::warn!(
            "Refusing to delete game {} with {} guide(s).",
            game.name,
            guide_count
        );
        return Err(AppError::Conflict(format!(
            "Game {} still has {} guide(s)",
            game.name, guide_count
        )));
    }

    state.db.delete_game(game.id).await?;
    tracing::info!("Game {} deleted by user {}.", game.name, auth.id());
    Ok(Json(ApiResponse::success(MessageResponse::message_only(
        "Game deleted successfully",
    ))))
}

fn parse_game_name(req: GameRequest) -> Result<String> {
    let name = non_blank(req.game_name.as_deref()).ok_or_else(|| {
        tracing::warn!("Game addition attempt with invalid fields.");
        AppError::BadRequest("Game name is required".to_string())
    })?;
    ensure_max_length(&name, "game_name")?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_name_is_trimmed() {
        let name = parse_game_name(GameRequest {
            game_name: Some("  Chess ".to_string()),
        })
        .unwrap();
        assert_eq!(name, "Chess");
    }

    #[test]
    fn missing_game_name_rejected() {
        for game_name in [None, Some(String::new()), Some("   ".to_string())] {
            let err = parse_game_name(GameRequest { game_name }).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(ref m) if m == "Game name is required"));
        }
    }
}
