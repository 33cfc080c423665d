//! services/api/src/web/datasets.rs
//!
//! Endpoints for uploading datasets and listing a user's datasets.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use model_studio_core::domain::{Dataset, FileType, Row, User};
use model_studio_core::ingest::{self, IngestError};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{port_error_response, state::AppState};

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct DatasetResponse {
    pub id: Uuid,
    pub name: String,
    pub file_type: String,
    pub file_size: usize,
    /// First five parsed rows. The full row collection is never serialized.
    #[schema(value_type = Vec<Object>)]
    pub data_preview: Vec<Row>,
    pub column_count: usize,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<Dataset> for DatasetResponse {
    fn from(dataset: Dataset) -> Self {
        Self {
            id: dataset.id,
            name: dataset.name,
            file_type: dataset.file_type.as_str().to_string(),
            file_size: dataset.file_size,
            data_preview: dataset.preview,
            column_count: dataset.column_count,
            row_count: dataset.row_count,
            created_at: dataset.created_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Upload a dataset file.
///
/// Accepts a multipart/form-data request with a `file` part (csv, json, or
/// txt, judged by file extension) and a `name` field.
#[utoipa::path(
    post,
    path = "/api/datasets/upload",
    request_body(content_type = "multipart/form-data", description = "The dataset file and its declared name."),
    responses(
        (status = 201, description = "Dataset created", body = DatasetResponse),
        (status = 400, description = "Unsupported file type or unparseable content"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_dataset_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                file = Some((file_name, data.to_vec()));
            }
            Some("name") => {
                let value = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read name field: {}", e),
                    )
                })?;
                name = Some(value);
            }
            _ => {}
        }
    }

    let (file_name, content) = file.ok_or((
        StatusCode::BAD_REQUEST,
        "Multipart form must include a file".to_string(),
    ))?;
    let name = name.ok_or((
        StatusCode::BAD_REQUEST,
        "Multipart form must include a name".to_string(),
    ))?;

    // Judge the declared type by the file extension, before parsing anything.
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    let file_type = FileType::from_extension(extension).map_err(bad_upload)?;

    let parsed = ingest::parse(&content, file_type).map_err(bad_upload)?;

    let dataset = Dataset {
        id: Uuid::new_v4(),
        user_id: user.id,
        name,
        file_type,
        file_size: content.len(),
        preview: parsed.preview,
        column_count: parsed.column_count,
        row_count: parsed.row_count,
        created_at: Utc::now(),
    };

    state
        .db
        .create_dataset(&dataset, &parsed.rows)
        .await
        .map_err(|e| {
            error!("Failed to store dataset: {:?}", e);
            port_error_response(e)
        })?;

    Ok((StatusCode::CREATED, Json(DatasetResponse::from(dataset))))
}

/// List the caller's datasets (previews only, full rows omitted).
#[utoipa::path(
    get,
    path = "/api/datasets",
    responses(
        (status = 200, description = "The caller's datasets", body = [DatasetResponse]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_datasets_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let datasets = state
        .db
        .list_datasets(user.id)
        .await
        .map_err(port_error_response)?;

    let response: Vec<DatasetResponse> = datasets.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

fn bad_upload(e: IngestError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
