//! services/api/src/web/dashboard.rs
//!
//! The per-user usage dashboard.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use model_studio_core::domain::{DashboardStats, User};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::{port_error_response, state::AppState};

#[derive(Serialize, ToSchema)]
pub struct DashboardStatsResponse {
    pub datasets: i64,
    pub models: i64,
    pub deployed: i64,
    /// Summed usage counters across the caller's deployments.
    pub api_calls: i64,
}

impl From<DashboardStats> for DashboardStatsResponse {
    fn from(stats: DashboardStats) -> Self {
        Self {
            datasets: stats.datasets,
            models: stats.models,
            deployed: stats.deployed,
            api_calls: stats.api_calls,
        }
    }
}

/// GET /api/dashboard/stats - counts of the caller's records plus total API usage.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Aggregate counts", body = DashboardStatsResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stats = state
        .db
        .dashboard_stats(user.id)
        .await
        .map_err(port_error_response)?;

    Ok(Json(DashboardStatsResponse::from(stats)))
}
