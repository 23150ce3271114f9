//! Tag API endpoints
//!
//! Handles HTTP requests for tag management:
//! - GET /api/v1/tags - List all tags
//! - POST /api/v1/tags - Create a tag, optionally attached to a media item
//! - GET /api/v1/tags/{tag} - List media carrying a tag (by name)
//! - DELETE /api/v1/tags/{tag} - Delete a tag (by ID) and its associations
//! - GET /api/v1/tags/media/{media_id} - List the tags of a media item
//! - PUT /api/v1/tags/media/{media_id}/{tag_id} - Attach a tag to a media item
//! - DELETE /api/v1/tags/media/{media_id}/{tag_id} - Detach a tag from a media item

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};

use crate::api::extract::{ApiJson, ApiPath};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::MessageResponse;
use crate::models::{CreateTagInput, MediaItemTag, Tag, TagResult};

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags).post(create_tag))
        .route("/media/{media_id}", get(list_tags_by_media))
        .route("/media/{media_id}/{tag_id}", put(attach_tag).delete(detach_tag))
        .route("/{tag}", get(list_media_by_tag).delete(delete_tag))
}

/// GET /api/v1/tags
async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    let tags = state.tag_service.list_all().await?;
    Ok(Json(tags))
}

/// POST /api/v1/tags
///
/// Without `media_id` the stored tag is returned. With `media_id` the tag and
/// its association are created together and a confirmation is returned.
async fn create_tag(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateTagInput>,
) -> Result<Response, ApiError> {
    match input.media_id {
        Some(media_id) => {
            state
                .tag_service
                .create_with_media(&input.tag_name, media_id)
                .await?;
            Ok((StatusCode::CREATED, Json(MessageResponse::new("Tag created"))).into_response())
        }
        None => {
            let tag = state.tag_service.create(&input.tag_name).await?;
            Ok((StatusCode::CREATED, Json(tag)).into_response())
        }
    }
}

/// GET /api/v1/tags/{tag}
async fn list_media_by_tag(
    State(state): State<AppState>,
    ApiPath(tag_name): ApiPath<String>,
) -> Result<Json<Vec<TagResult>>, ApiError> {
    let media = state.tag_service.list_media_by_tag(&tag_name).await?;
    Ok(Json(media))
}

/// DELETE /api/v1/tags/{tag}
async fn delete_tag(
    State(state): State<AppState>,
    ApiPath(tag_id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tag_service.delete(tag_id).await?;
    Ok(Json(MessageResponse::new("Tag deleted")))
}

/// GET /api/v1/tags/media/{media_id}
async fn list_tags_by_media(
    State(state): State<AppState>,
    ApiPath(media_id): ApiPath<i64>,
) -> Result<Json<Vec<TagResult>>, ApiError> {
    let tags = state.tag_service.list_by_media(media_id).await?;
    Ok(Json(tags))
}

/// PUT /api/v1/tags/media/{media_id}/{tag_id}
async fn attach_tag(
    State(state): State<AppState>,
    ApiPath((media_id, tag_id)): ApiPath<(i64, i64)>,
) -> Result<(StatusCode, Json<MediaItemTag>), ApiError> {
    let link = state.tag_service.attach(tag_id, media_id).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// DELETE /api/v1/tags/media/{media_id}/{tag_id}
async fn detach_tag(
    State(state): State<AppState>,
    ApiPath((media_id, tag_id)): ApiPath<(i64, i64)>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tag_service.detach(tag_id, media_id).await?;
    Ok(Json(MessageResponse::new("Tag removed from media")))
}
