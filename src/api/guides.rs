use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::{
        ApiResponse, Guide, GuideDetails, GuideUpdate, MessageResponse, NewGuide,
        PaginatedResponse,
    },
    utils::{ensure_max_length, non_blank, normalize_page, optional_field, optional_text},
};

use super::{require_user, ApiPath, ApiQuery, AppState, AuthUser, JsonOrForm};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AddGuideRequest {
    pub game_name: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub video: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditGuideRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub video: Option<String>,
    pub image: Option<String>,
}

const NOT_OWNED: &str = "Guide not found or not authorized";

/// GET /api/v1/guides
pub async fn list_guides(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<GuideDetails>>>> {
    let (page, limit, offset) = normalize_page(query.page, query.limit);
    let items = state.db.list_guides_page(limit, offset).await?;
    let total = state.db.count_guides().await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        page,
        limit,
        total,
    })))
}

/// GET /api/v1/guides/{id}
pub async fn view_guide(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<GuideDetails>>> {
    require_user(&headers, &state).await?;

    if state.db.get_guide(id).await?.is_none() {
        tracing::warn!("Guide with ID {} not found.", id);
        return Err(AppError::NotFound(format!("Guide with ID {} not found.", id)));
    }

    state.db.increment_guide_usage(id).await?;
    let guide = state
        .db
        .get_guide_details(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Guide with ID {} not found.", id)))?;

    Ok(Json(ApiResponse::success(guide)))
}

/// POST /api/v1/guides
pub async fn add_guide(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(req): JsonOrForm<AddGuideRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse<Guide>>>)> {
    let auth = require_user(&headers, &state).await?;

    let fields = [
        non_blank(req.game_name.as_deref()),
        non_blank(req.title.as_deref()),
        non_blank(req.content.as_deref()),
        non_blank(req.link.as_deref()),
        non_blank(req.video.as_deref()),
        non_blank(req.image.as_deref()),
    ];
    let [Some(game_name), Some(title), Some(content), Some(link), Some(video), Some(image)] =
        fields
    else {
        tracing::warn!("Guide addition attempt with invalid fields.");
        return Err(AppError::BadRequest("All fields are required".to_string()));
    };
    // content is the guide body and stays uncapped
    for (value, name) in [
        (&title, "title"),
        (&link, "link"),
        (&video, "video"),
        (&image, "image"),
    ] {
        ensure_max_length(value, name)?;
    }

    let game = state.db.get_game_by_name(&game_name).await?.ok_or_else(|| {
        tracing::warn!("Guide addition attempt for non-existent game: {}.", game_name);
        AppError::NotFound(format!("Game {} not found", game_name))
    })?;

    let guide = state
        .db
        .create_guide(&NewGuide {
            title,
            content,
            link,
            video,
            image,
            user_id: auth.id(),
            game_id: game.id,
        })
        .await?;

    tracing::info!(
        "New guide added successfully for game {} by user {}.",
        game_name,
        auth.id()
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(MessageResponse::new(
            format!("New guide added successfully for game {}", game_name),
            guide,
        ))),
    ))
}

/// PUT /api/v1/guides/{id}
pub async fn edit_guide(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
    JsonOrForm(req): JsonOrForm<EditGuideRequest>,
) -> Result<Json<ApiResponse<MessageResponse<Guide>>>> {
    let auth = require_user(&headers, &state).await?;
    let current = ensure_owned_guide(&state, &auth, id).await?;

    let update = GuideUpdate {
        title: optional_field(req.title.as_deref(), "title")?,
        content: optional_text(req.content.as_deref(), "content")?,
        link: optional_field(req.link.as_deref(), "link")?,
        video: optional_field(req.video.as_deref(), "video")?,
        image: optional_field(req.image.as_deref(), "image")?,
    };
    if update.is_empty() {
        return Ok(Json(ApiResponse::success(MessageResponse::new(
            "Nothing to update",
            current,
        ))));
    }

    let guide = state
        .db
        .update_guide(id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_OWNED.to_string()))?;

    tracing::info!("Guide {} updated by user {}.", id, auth.id());
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Guide updated successfully",
        guide,
    ))))
}

/// DELETE /api/v1/guides/{id}
pub async fn delete_guide(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MessageResponse<()>>>> {
    let auth = require_user(&headers, &state).await?;
    ensure_owned_guide(&state, &auth, id).await?;

    state.db.delete_guide(id).await?;
    tracing::info!("Guide {} deleted by user {}.", id, auth.id());
    Ok(Json(ApiResponse::success(MessageResponse::message_only(
        "Guide deleted successfully",
    ))))
}

/// GET /api/v1/guides/featured
pub async fn list_featured_guides(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<GuideDetails>>>> {
    let name = &state.config.featured_game;
    let game = state
        .db
        .get_game_by_name(name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Game {} not found", name)))?;

    let guides = state.db.list_game_guides(game.id).await?;
    Ok(Json(ApiResponse::success(guides)))
}

/// GET /api/v1/guides/other
pub async fn list_other_guides(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<GuideDetails>>>> {
    let guides = state
        .db
        .list_guides_excluding_game(&state.config.featured_game)
        .await?;
    Ok(Json(ApiResponse::success(guides)))
}

// Someone else's guide looks the same as a missing one.
async fn ensure_owned_guide(state: &AppState, auth: &AuthUser, id: i64) -> Result<Guide> {
    match state.db.get_guide(id).await? {
        Some(guide) if guide.user_id == auth.id() => Ok(guide),
        Some(_) => {
            tracing::warn!("User {} tried to modify guide {} they do not own.", auth.id(), id);
            Err(AppError::NotFound(NOT_OWNED.to_string()))
        }
        None => Err(AppError::NotFound(NOT_OWNED.to_string())),
    }
}
