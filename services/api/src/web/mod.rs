//! services/api/src/web/mod.rs
//!
//! The HTTP surface: route table, auth middleware, handlers, and the master
//! definition for the OpenAPI specification.

pub mod auth;
pub mod dashboard;
pub mod datasets;
pub mod middleware;
pub mod models;
pub mod state;
pub mod token;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use model_studio_core::ports::PortError;
use std::sync::Arc;
use tracing::error;
use utoipa::OpenApi;

use state::AppState;

pub use middleware::require_auth;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        datasets::upload_dataset_handler,
        datasets::list_datasets_handler,
        models::train_model_handler,
        models::list_models_handler,
        models::test_model_handler,
        models::deploy_model_handler,
        models::list_deployed_handler,
        models::predict_handler,
        dashboard::stats_handler,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::UserResponse,
            auth::AuthResponse,
            datasets::DatasetResponse,
            models::TrainRequest,
            models::TrainingResponse,
            models::DeploymentResponse,
            models::ModelTestRequest,
            models::ModelTestResponse,
            dashboard::DashboardStatsResponse,
        )
    ),
    tags(
        (name = "Model Studio API", description = "API endpoints for the prompt-backed model training platform.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// The single place where port errors become transport status codes.
///
/// An owner mismatch is deliberately indistinguishable from absence (both
/// arrive here as `NotFound`), so callers cannot probe for foreign records.
pub(crate) fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("Unexpected port error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            )
        }
    }
}

//=========================================================================================
// Router Construction
//=========================================================================================

/// Builds the full application router around the given shared state.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route("/datasets/upload", post(datasets::upload_dataset_handler))
        .route("/datasets", get(datasets::list_datasets_handler))
        .route("/models/train", post(models::train_model_handler))
        .route("/models", get(models::list_models_handler))
        .route("/models/deployed", get(models::list_deployed_handler))
        .route("/models/{model_id}/test", post(models::test_model_handler))
        .route(
            "/models/{model_id}/deploy",
            post(models::deploy_model_handler),
        )
        .route(
            "/models/{model_id}/predict",
            post(models::predict_handler),
        )
        .route("/dashboard/stats", get(dashboard::stats_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(app_state)
}
