//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model_studio_core::domain::{
    DashboardStats, Dataset, DeployedModel, DeploymentStatus, FileType, ModelTraining, Row,
    TrainingStatus, User, UserCredentials,
};
use model_studio_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    name: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserCredentialsRecord {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}
impl UserCredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user: User {
                id: self.id,
                email: self.email,
                name: self.name,
                created_at: self.created_at,
            },
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct DatasetRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    file_type: String,
    file_size: i64,
    preview: serde_json::Value,
    column_count: i32,
    row_count: i32,
    created_at: DateTime<Utc>,
}
impl DatasetRecord {
    fn to_domain(self) -> PortResult<Dataset> {
        Ok(Dataset {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            file_type: file_type_from_str(&self.file_type)?,
            file_size: self.file_size as usize,
            preview: rows_from_value(self.preview)?,
            column_count: self.column_count as usize,
            row_count: self.row_count as usize,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct TrainingRecord {
    id: Uuid,
    user_id: Uuid,
    dataset_id: Uuid,
    name: String,
    status: String,
    model_type: String,
    custom_prompt: String,
    training_data: serde_json::Value,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}
impl TrainingRecord {
    fn to_domain(self) -> PortResult<ModelTraining> {
        Ok(ModelTraining {
            id: self.id,
            user_id: self.user_id,
            dataset_id: self.dataset_id,
            name: self.name,
            status: training_status_from_str(&self.status)?,
            model_type: self.model_type,
            custom_prompt: self.custom_prompt,
            training_data: rows_from_value(self.training_data)?,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct DeploymentRecord {
    id: Uuid,
    user_id: Uuid,
    training_id: Uuid,
    name: String,
    api_endpoint: String,
    status: String,
    usage_count: i64,
    created_at: DateTime<Utc>,
}
impl DeploymentRecord {
    fn to_domain(self) -> PortResult<DeployedModel> {
        Ok(DeployedModel {
            id: self.id,
            user_id: self.user_id,
            training_id: self.training_id,
            name: self.name,
            api_endpoint: self.api_endpoint,
            status: deployment_status_from_str(&self.status)?,
            usage_count: self.usage_count,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// Column Conversion Helpers
//=========================================================================================

// The store cannot guarantee enum-valued columns, so validate on read.

fn file_type_from_str(value: &str) -> PortResult<FileType> {
    match value {
        "csv" => Ok(FileType::Csv),
        "json" => Ok(FileType::Json),
        "txt" => Ok(FileType::Txt),
        other => Err(PortError::Unexpected(format!(
            "unknown file_type in store: {}",
            other
        ))),
    }
}

fn training_status_from_str(value: &str) -> PortResult<TrainingStatus> {
    match value {
        "training" => Ok(TrainingStatus::Training),
        "completed" => Ok(TrainingStatus::Completed),
        other => Err(PortError::Unexpected(format!(
            "unknown training status in store: {}",
            other
        ))),
    }
}

fn deployment_status_from_str(value: &str) -> PortResult<DeploymentStatus> {
    match value {
        "active" => Ok(DeploymentStatus::Active),
        "inactive" => Ok(DeploymentStatus::Inactive),
        other => Err(PortError::Unexpected(format!(
            "unknown deployment status in store: {}",
            other
        ))),
    }
}

fn rows_from_value(value: serde_json::Value) -> PortResult<Vec<Row>> {
    serde_json::from_value(value)
        .map_err(|e| PortError::Unexpected(format!("malformed row data in store: {}", e)))
}

fn rows_to_value(rows: &[Row]) -> PortResult<serde_json::Value> {
    serde_json::to_value(rows).map_err(|e| PortError::Unexpected(e.to_string()))
}

//=========================================================================================
// Statements With Non-Obvious Shape
//=========================================================================================

/// A user may deploy the same training more than once, so the bump is pinned
/// to exactly one deployment row per call.
const INCREMENT_USAGE_SQL: &str =
    "UPDATE deployed_models SET usage_count = usage_count + 1 \
     WHERE id = (SELECT id FROM deployed_models \
                 WHERE training_id = $1 AND user_id = $2 \
                 ORDER BY created_at ASC LIMIT 1)";

/// `SUM(bigint)` is NUMERIC in Postgres; the cast keeps the whole row
/// decodable as eight-byte integers.
const DASHBOARD_STATS_SQL: &str = "SELECT \
     (SELECT COUNT(*) FROM datasets WHERE user_id = $1), \
     (SELECT COUNT(*) FROM model_trainings WHERE user_id = $1), \
     (SELECT COUNT(*) FROM deployed_models WHERE user_id = $1), \
     (SELECT COALESCE(SUM(usage_count), 0)::BIGINT FROM deployed_models WHERE user_id = $1)";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, name, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING id, email, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err)
                if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                PortError::Conflict(format!("User with email {} already exists", email))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserCredentialsRecord>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User with email {} not found", email))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, name, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn create_dataset(&self, dataset: &Dataset, rows: &[Row]) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO datasets \
             (id, user_id, name, file_type, file_size, preview, full_data, column_count, row_count, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(dataset.id)
        .bind(dataset.user_id)
        .bind(&dataset.name)
        .bind(dataset.file_type.as_str())
        .bind(dataset.file_size as i64)
        .bind(rows_to_value(&dataset.preview)?)
        .bind(rows_to_value(rows)?)
        .bind(dataset.column_count as i32)
        .bind(dataset.row_count as i32)
        .bind(dataset.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(())
    }

    async fn list_datasets(&self, user_id: Uuid) -> PortResult<Vec<Dataset>> {
        // full_data is deliberately not selected: listings carry previews only.
        let records = sqlx::query_as::<_, DatasetRecord>(
            "SELECT id, user_id, name, file_type, file_size, preview, column_count, row_count, created_at \
             FROM datasets WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_dataset_rows(&self, dataset_id: Uuid, user_id: Uuid) -> PortResult<Vec<Row>> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT full_data FROM datasets WHERE id = $1 AND user_id = $2",
        )
        .bind(dataset_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Dataset {} not found", dataset_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        rows_from_value(value)
    }

    async fn create_training(&self, training: &ModelTraining) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO model_trainings \
             (id, user_id, dataset_id, name, status, model_type, custom_prompt, training_data, created_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(training.id)
        .bind(training.user_id)
        .bind(training.dataset_id)
        .bind(&training.name)
        .bind(training.status.as_str())
        .bind(&training.model_type)
        .bind(&training.custom_prompt)
        .bind(rows_to_value(&training.training_data)?)
        .bind(training.created_at)
        .bind(training.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(())
    }

    async fn list_trainings(&self, user_id: Uuid) -> PortResult<Vec<ModelTraining>> {
        let records = sqlx::query_as::<_, TrainingRecord>(
            "SELECT id, user_id, dataset_id, name, status, model_type, custom_prompt, training_data, created_at, completed_at \
             FROM model_trainings WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_training(&self, training_id: Uuid, user_id: Uuid) -> PortResult<ModelTraining> {
        let record = sqlx::query_as::<_, TrainingRecord>(
            "SELECT id, user_id, dataset_id, name, status, model_type, custom_prompt, training_data, created_at, completed_at \
             FROM model_trainings WHERE id = $1 AND user_id = $2",
        )
        .bind(training_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Model {} not found", training_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        record.to_domain()
    }

    async fn create_deployment(&self, deployment: &DeployedModel) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO deployed_models \
             (id, user_id, training_id, name, api_endpoint, status, usage_count, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(deployment.id)
        .bind(deployment.user_id)
        .bind(deployment.training_id)
        .bind(&deployment.name)
        .bind(&deployment.api_endpoint)
        .bind(deployment.status.as_str())
        .bind(deployment.usage_count)
        .bind(deployment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(())
    }

    async fn list_deployments(&self, user_id: Uuid) -> PortResult<Vec<DeployedModel>> {
        let records = sqlx::query_as::<_, DeploymentRecord>(
            "SELECT id, user_id, training_id, name, api_endpoint, status, usage_count, created_at \
             FROM deployed_models WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn increment_usage(&self, training_id: Uuid, user_id: Uuid) -> PortResult<()> {
        // Single-statement increment; the store serializes concurrent bumps.
        let result = sqlx::query(INCREMENT_USAGE_SQL)
            .bind(training_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Deployment for model {} not found",
                training_id
            )));
        }
        Ok(())
    }

    async fn dashboard_stats(&self, user_id: Uuid) -> PortResult<DashboardStats> {
        let (datasets, models, deployed, api_calls) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(DASHBOARD_STATS_SQL)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(DashboardStats {
            datasets,
            models,
            deployed,
            api_calls,
        })
    }
}
