//! services/api/src/web/models.rs
//!
//! Endpoints for "training", testing, deploying, and querying models. A model
//! here is a stored system prompt bound to a dataset snapshot; testing and
//! prediction pass the caller's text through the inference delegate.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Form, Json,
};
use chrono::{DateTime, Utc};
use model_studio_core::domain::{
    DeployedModel, DeploymentStatus, ModelTraining, Row, TrainingStatus, User,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{port_error_response, state::AppState};

/// Trainings snapshot at most this many dataset rows.
const TRAINING_DATA_CAP: usize = 100;

/// The delegate reports no real confidence; this fixed value stands in.
const SIMULATED_CONFIDENCE: f64 = 0.95;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct TrainRequest {
    pub dataset_id: Uuid,
    pub model_name: String,
    pub custom_prompt: String,
}

#[derive(Serialize, ToSchema)]
pub struct TrainingResponse {
    pub id: Uuid,
    pub name: String,
    pub dataset_id: Uuid,
    pub status: String,
    pub model_type: String,
    pub custom_prompt: String,
    #[schema(value_type = Vec<Object>)]
    pub training_data: Vec<Row>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ModelTraining> for TrainingResponse {
    fn from(training: ModelTraining) -> Self {
        Self {
            id: training.id,
            name: training.name,
            dataset_id: training.dataset_id,
            status: training.status.as_str().to_string(),
            model_type: training.model_type,
            custom_prompt: training.custom_prompt,
            training_data: training.training_data,
            created_at: training.created_at,
            completed_at: training.completed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DeploymentResponse {
    pub id: Uuid,
    pub name: String,
    pub training_id: Uuid,
    pub api_endpoint: String,
    pub status: String,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DeployedModel> for DeploymentResponse {
    fn from(deployment: DeployedModel) -> Self {
        Self {
            id: deployment.id,
            name: deployment.name,
            training_id: deployment.training_id,
            api_endpoint: deployment.api_endpoint,
            status: deployment.status.as_str().to_string(),
            usage_count: deployment.usage_count,
            created_at: deployment.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ModelTestRequest {
    pub input_text: String,
}

#[derive(Serialize, ToSchema)]
pub struct ModelTestResponse {
    pub output: String,
    pub confidence: f64,
    pub processing_time: f64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// "Train" a model: snapshot the dataset behind a custom prompt.
///
/// There is no job queue; the record is created already completed.
#[utoipa::path(
    post,
    path = "/api/models/train",
    responses(
        (status = 201, description = "Training record created (and completed)", body = TrainingResponse),
        (status = 404, description = "Dataset not found"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn train_model_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Form(req): Form<TrainRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Owner-scoped read: a dataset belonging to someone else reads as absent.
    let mut rows = state
        .db
        .get_dataset_rows(req.dataset_id, user.id)
        .await
        .map_err(port_error_response)?;
    rows.truncate(TRAINING_DATA_CAP);

    let now = Utc::now();
    let training = ModelTraining {
        id: Uuid::new_v4(),
        user_id: user.id,
        dataset_id: req.dataset_id,
        name: req.model_name,
        status: TrainingStatus::Completed,
        model_type: state.config.chat_model.clone(),
        custom_prompt: req.custom_prompt,
        training_data: rows,
        created_at: now,
        completed_at: Some(now),
    };

    state.db.create_training(&training).await.map_err(|e| {
        error!("Failed to store training: {:?}", e);
        port_error_response(e)
    })?;

    Ok((StatusCode::CREATED, Json(TrainingResponse::from(training))))
}

/// List the caller's model trainings.
#[utoipa::path(
    get,
    path = "/api/models",
    responses(
        (status = 200, description = "The caller's trainings", body = [TrainingResponse]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_models_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let trainings = state
        .db
        .list_trainings(user.id)
        .await
        .map_err(port_error_response)?;

    let response: Vec<TrainingResponse> = trainings.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Run a model against one input via the inference delegate.
#[utoipa::path(
    post,
    path = "/api/models/{model_id}/test",
    request_body = ModelTestRequest,
    params(("model_id" = Uuid, Path, description = "The training to test")),
    responses(
        (status = 200, description = "Delegate output", body = ModelTestResponse),
        (status = 404, description = "Model not found"),
        (status = 500, description = "Inference delegate unconfigured or failing"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn test_model_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(model_id): Path<Uuid>,
    Json(req): Json<ModelTestRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let response = run_model(&state, &user, model_id, &req.input_text).await?;
    Ok(Json(response))
}

/// Deploy a trained model behind a synthetic prediction endpoint.
#[utoipa::path(
    post,
    path = "/api/models/{model_id}/deploy",
    params(("model_id" = Uuid, Path, description = "The training to deploy")),
    responses(
        (status = 201, description = "Deployment created", body = DeploymentResponse),
        (status = 404, description = "Model not found"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn deploy_model_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(model_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let training = state
        .db
        .get_training(model_id, user.id)
        .await
        .map_err(port_error_response)?;

    let deployment = DeployedModel {
        id: Uuid::new_v4(),
        user_id: user.id,
        training_id: model_id,
        name: format!("{}-api", training.name),
        api_endpoint: format!("/models/{}/predict", model_id),
        status: DeploymentStatus::Active,
        usage_count: 0,
        created_at: Utc::now(),
    };

    state.db.create_deployment(&deployment).await.map_err(|e| {
        error!("Failed to store deployment: {:?}", e);
        port_error_response(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(DeploymentResponse::from(deployment)),
    ))
}

/// List the caller's deployed models.
#[utoipa::path(
    get,
    path = "/api/models/deployed",
    responses(
        (status = 200, description = "The caller's deployments", body = [DeploymentResponse]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_deployed_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let deployments = state
        .db
        .list_deployments(user.id)
        .await
        .map_err(port_error_response)?;

    let response: Vec<DeploymentResponse> = deployments.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Call a deployed model. Bumps the usage counter, then behaves exactly as test.
#[utoipa::path(
    post,
    path = "/api/models/{model_id}/predict",
    request_body = ModelTestRequest,
    params(("model_id" = Uuid, Path, description = "The deployed training to call")),
    responses(
        (status = 200, description = "Delegate output", body = ModelTestResponse),
        (status = 404, description = "No owned deployment for this model"),
        (status = 500, description = "Inference delegate unconfigured or failing"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(model_id): Path<Uuid>,
    Json(req): Json<ModelTestRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Count the call before delegating, like the original endpoint.
    state
        .db
        .increment_usage(model_id, user.id)
        .await
        .map_err(port_error_response)?;

    let response = run_model(&state, &user, model_id, &req.input_text).await?;
    Ok(Json(response))
}

//=========================================================================================
// Shared Inference Path
//=========================================================================================

/// The pass-through inference call shared by test and predict: a fresh
/// delegate session per call, no caching, no retry.
async fn run_model(
    state: &AppState,
    user: &User,
    model_id: Uuid,
    input_text: &str,
) -> Result<ModelTestResponse, (StatusCode, String)> {
    let training = state
        .db
        .get_training(model_id, user.id)
        .await
        .map_err(port_error_response)?;

    let chat_adapter = state.chat_adapter.as_ref().ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        "Inference API key not configured".to_string(),
    ))?;

    let started = Instant::now();
    let output = chat_adapter
        .complete(&training.custom_prompt, input_text)
        .await
        .map_err(|e| {
            error!("Inference delegate call failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error testing model: {}", e),
            )
        })?;

    Ok(ModelTestResponse {
        output,
        confidence: SIMULATED_CONFIDENCE,
        processing_time: started.elapsed().as_secs_f64(),
    })
}
