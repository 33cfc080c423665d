//! crates/model_studio_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single parsed record from an uploaded file, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/registration - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// The declared format of an uploaded dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Json,
    Txt,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Json => "json",
            FileType::Txt => "txt",
        }
    }
}

/// An uploaded file converted into row/column structured data.
///
/// The full row collection lives behind the persistence port and is never
/// part of this struct; listings only ever carry the bounded preview.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub file_type: FileType,
    pub file_size: usize,
    pub preview: Vec<Row>,
    pub column_count: usize,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    Training,
    Completed,
}

impl TrainingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::Training => "training",
            TrainingStatus::Completed => "completed",
        }
    }
}

/// A stored system prompt bound to a snapshot of a dataset.
///
/// "Training" is synchronous: the record is written already completed, there
/// is no job queue and no failure path.
#[derive(Debug, Clone)]
pub struct ModelTraining {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dataset_id: Uuid,
    pub name: String,
    pub status: TrainingStatus,
    pub model_type: String,
    pub custom_prompt: String,
    pub training_data: Vec<Row>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    Active,
    Inactive,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Active => "active",
            DeploymentStatus::Inactive => "inactive",
        }
    }
}

/// A published reference to a `ModelTraining` with a usage counter and a
/// synthetic endpoint path.
#[derive(Debug, Clone)]
pub struct DeployedModel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub training_id: Uuid,
    pub name: String,
    pub api_endpoint: String,
    pub status: DeploymentStatus,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-user aggregate counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardStats {
    pub datasets: i64,
    pub models: i64,
    pub deployed: i64,
    pub api_calls: i64,
}
