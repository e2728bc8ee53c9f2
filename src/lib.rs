pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::staging::DiskStager;
use crate::services::transform::ImageTransformer;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::profile::upload_avatar,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::profile::AvatarUploadForm,
            api::handlers::profile::ProfileResponse,
            api::handlers::health::HealthResponse,
            services::transform::TransformOutcome,
        )
    ),
    tags(
        (name = "profile", description = "Avatar upload and transformation"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub stager: Arc<DiskStager>,
    pub transformer: Arc<dyn ImageTransformer>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    let public_dir = state.config.public_dir.clone();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/profile",
            post(api::handlers::profile::upload_avatar).layer(
                // Extra headroom for multipart framing overhead
                axum::extract::DefaultBodyLimit::max(state.config.max_file_size + 1024 * 1024),
            ),
        )
        .fallback_service(ServeDir::new(public_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
