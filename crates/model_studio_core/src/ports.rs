//! crates/model_studio_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    DashboardStats, Dataset, DeployedModel, ModelTraining, Row, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The persistence gateway. Every read other than the email lookup used during
/// login is scoped to the owning user; an owner mismatch is reported as
/// `NotFound`, identically to absence.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> PortResult<User>;

    /// Global (not owner-scoped) lookup, used by registration and login only.
    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    // --- Dataset Management ---
    /// Stores the dataset record together with its full row collection.
    async fn create_dataset(&self, dataset: &Dataset, rows: &[Row]) -> PortResult<()>;

    async fn list_datasets(&self, user_id: Uuid) -> PortResult<Vec<Dataset>>;

    /// Returns the full (not previewed) row collection of an owned dataset.
    async fn get_dataset_rows(&self, dataset_id: Uuid, user_id: Uuid) -> PortResult<Vec<Row>>;

    // --- Model Training Management ---
    async fn create_training(&self, training: &ModelTraining) -> PortResult<()>;

    async fn list_trainings(&self, user_id: Uuid) -> PortResult<Vec<ModelTraining>>;

    async fn get_training(&self, training_id: Uuid, user_id: Uuid) -> PortResult<ModelTraining>;

    // --- Deployment Management ---
    async fn create_deployment(&self, deployment: &DeployedModel) -> PortResult<()>;

    async fn list_deployments(&self, user_id: Uuid) -> PortResult<Vec<DeployedModel>>;

    /// Atomically bumps the usage counter of the deployment backed by the
    /// given training. `NotFound` when no owned deployment matches.
    async fn increment_usage(&self, training_id: Uuid, user_id: Uuid) -> PortResult<()>;

    // --- Dashboard ---
    async fn dashboard_stats(&self, user_id: Uuid) -> PortResult<DashboardStats>;
}

/// The inference delegate: a hosted chat-completion API.
#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Runs a fresh single-turn conversation: `system_prompt` as the system
    /// instruction, `input` as the one user message. Returns the generated
    /// text verbatim.
    async fn complete(&self, system_prompt: &str, input: &str) -> PortResult<String>;
}
