//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Service banner at the root
//! - Tag API endpoints under `/tags`

pub mod extract;
pub mod middleware;
pub mod responses;
pub mod tags;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};
pub use responses::MessageResponse;

/// Build the main API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .nest("/tags", tags::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(Router::new()
        .nest("/api/v1", build_api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// GET /api/v1
async fn banner() -> Json<MessageResponse> {
    Json(MessageResponse::new("media api v1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagConfig;
    use crate::db::{create_test_pool, repositories::SqlxTagRepository};
    use crate::services::TagService;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_build_router_rejects_invalid_cors_origin() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlxTagRepository::boxed(pool);
        let state = AppState {
            tag_service: Arc::new(TagService::new(repo, &TagConfig::default())),
        };

        assert!(build_router(state.clone(), "http://localhost:5173").is_ok());
        assert!(build_router(state, "bad\norigin").is_err());
    }
}
