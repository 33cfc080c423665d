//! HTTP API integration tests
//!
//! Exercises the real router and handlers against in-memory implementations
//! of the persistence and chat-completion ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState, token};
use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use chrono::{Duration, Utc};
use model_studio_core::domain::{
    DashboardStats, Dataset, DeployedModel, ModelTraining, Row, User, UserCredentials,
};
use model_studio_core::ports::{
    ChatCompletionService, DatabaseService, PortError, PortResult,
};
use serde_json::{json, Value};
use uuid::Uuid;

const JWT_SECRET: &str = "integration-test-secret";

//=========================================================================================
// In-Memory Port Implementations
//=========================================================================================

#[derive(Default)]
struct InMemoryDb {
    users: Mutex<Vec<UserCredentials>>,
    datasets: Mutex<Vec<(Dataset, Vec<Row>)>>,
    trainings: Mutex<Vec<ModelTraining>>,
    deployments: Mutex<Vec<DeployedModel>>,
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.user.email == email) {
            return Err(PortError::Conflict(format!(
                "User with email {} already exists",
                email
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        users.push(UserCredentials {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.user.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.user.id == user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn create_dataset(&self, dataset: &Dataset, rows: &[Row]) -> PortResult<()> {
        self.datasets
            .lock()
            .unwrap()
            .push((dataset.clone(), rows.to_vec()));
        Ok(())
    }

    async fn list_datasets(&self, user_id: Uuid) -> PortResult<Vec<Dataset>> {
        Ok(self
            .datasets
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d.user_id == user_id)
            .map(|(d, _)| d.clone())
            .collect())
    }

    async fn get_dataset_rows(&self, dataset_id: Uuid, user_id: Uuid) -> PortResult<Vec<Row>> {
        self.datasets
            .lock()
            .unwrap()
            .iter()
            .find(|(d, _)| d.id == dataset_id && d.user_id == user_id)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| PortError::NotFound(format!("Dataset {} not found", dataset_id)))
    }

    async fn create_training(&self, training: &ModelTraining) -> PortResult<()> {
        self.trainings.lock().unwrap().push(training.clone());
        Ok(())
    }

    async fn list_trainings(&self, user_id: Uuid) -> PortResult<Vec<ModelTraining>> {
        Ok(self
            .trainings
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_training(&self, training_id: Uuid, user_id: Uuid) -> PortResult<ModelTraining> {
        self.trainings
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == training_id && t.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Model {} not found", training_id)))
    }

    async fn create_deployment(&self, deployment: &DeployedModel) -> PortResult<()> {
        self.deployments.lock().unwrap().push(deployment.clone());
        Ok(())
    }

    async fn list_deployments(&self, user_id: Uuid) -> PortResult<Vec<DeployedModel>> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn increment_usage(&self, training_id: Uuid, user_id: Uuid) -> PortResult<()> {
        let mut deployments = self.deployments.lock().unwrap();
        let deployment = deployments
            .iter_mut()
            .find(|d| d.training_id == training_id && d.user_id == user_id)
            .ok_or_else(|| {
                PortError::NotFound(format!("Deployment for model {} not found", training_id))
            })?;
        deployment.usage_count += 1;
        Ok(())
    }

    async fn dashboard_stats(&self, user_id: Uuid) -> PortResult<DashboardStats> {
        let datasets = self.list_datasets(user_id).await?.len() as i64;
        let models = self.list_trainings(user_id).await?.len() as i64;
        let deployments = self.list_deployments(user_id).await?;
        Ok(DashboardStats {
            datasets,
            models,
            deployed: deployments.len() as i64,
            api_calls: deployments.iter().map(|d| d.usage_count).sum(),
        })
    }
}

/// A canned chat delegate that records how often it is invoked.
#[derive(Default)]
struct CountingChat {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatCompletionService for CountingChat {
    async fn complete(&self, system_prompt: &str, input: &str) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("[{}] {}", system_prompt, input))
    }
}

//=========================================================================================
// Test Harness
//=========================================================================================

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        jwt_secret: JWT_SECRET.to_string(),
        cors_origins: vec!["*".to_string()],
        openai_api_key: None,
        chat_model: "test-model".to_string(),
    }
}

struct Harness {
    server: TestServer,
    chat: Arc<CountingChat>,
}

fn setup() -> Harness {
    let chat = Arc::new(CountingChat::default());
    let state = Arc::new(AppState {
        db: Arc::new(InMemoryDb::default()),
        config: Arc::new(test_config()),
        chat_adapter: Some(chat.clone()),
    });
    Harness {
        server: TestServer::new(build_router(state)).unwrap(),
        chat,
    }
}

/// A server whose inference delegate is unconfigured.
fn setup_without_chat() -> TestServer {
    let state = Arc::new(AppState {
        db: Arc::new(InMemoryDb::default()),
        config: Arc::new(test_config()),
        chat_adapter: None,
    });
    TestServer::new(build_router(state)).unwrap()
}

async fn register(server: &TestServer, email: &str) -> String {
    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "email": email,
            "password": "hunter2hunter2",
            "name": "Test User",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    body["access_token"].as_str().unwrap().to_string()
}

async fn upload_csv(server: &TestServer, token: &str) -> Uuid {
    let form = MultipartForm::new()
        .add_text("name", "people")
        .add_part(
            "file",
            Part::bytes(b"name,age\nA,1\nB,2".to_vec()).file_name("people.csv"),
        );
    let response = server
        .post("/api/datasets/upload")
        .authorization_bearer(token)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    body["id"].as_str().unwrap().parse().unwrap()
}

async fn train(server: &TestServer, token: &str, dataset_id: Uuid) -> Uuid {
    let response = server
        .post("/api/models/train")
        .authorization_bearer(token)
        .form(&[
            ("dataset_id", dataset_id.to_string()),
            ("model_name", "helper".to_string()),
            ("custom_prompt", "You are a helpful assistant.".to_string()),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    body["id"].as_str().unwrap().parse().unwrap()
}

//=========================================================================================
// Auth
//=========================================================================================

#[tokio::test]
async fn register_then_duplicate_email_is_rejected() {
    let h = setup();

    register(&h.server, "a@example.com").await;

    let response = h
        .server
        .post("/api/auth/register")
        .json(&json!({
            "email": "a@example.com",
            "password": "other-password",
            "name": "Someone Else",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_checks_password() {
    let h = setup();
    register(&h.server, "a@example.com").await;

    let ok = h
        .server
        .post("/api/auth/login")
        .json(&json!({"email": "a@example.com", "password": "hunter2hunter2"}))
        .await;
    assert_eq!(ok.status_code(), StatusCode::OK);
    let body: Value = ok.json();
    assert!(body["access_token"].as_str().is_some());
    assert_eq!(body["user"]["email"], "a@example.com");
    assert!(body["user"].get("password_hash").is_none());

    let wrong = h
        .server
        .post("/api/auth/login")
        .json(&json!({"email": "a@example.com", "password": "wrong"}))
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);

    let unknown = h
        .server
        .post("/api/auth/login")
        .json(&json!({"email": "nobody@example.com", "password": "hunter2hunter2"}))
        .await;
    assert_eq!(unknown.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_reject_bad_tokens() {
    let h = setup();

    let missing = h.server.get("/api/datasets").await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    let garbage = h
        .server
        .get("/api/datasets")
        .authorization_bearer("not.a.token")
        .await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);

    // A well-signed token whose user does not exist is still unauthorized.
    let orphan = token::issue(Uuid::new_v4(), JWT_SECRET).unwrap();
    let response = h
        .server
        .get("/api/datasets")
        .authorization_bearer(&orphan)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let h = setup();
    register(&h.server, "a@example.com").await;

    let now = Utc::now();
    let claims = token::Claims {
        sub: Uuid::new_v4().to_string(),
        exp: (now - Duration::hours(1)).timestamp(),
        iat: (now - Duration::days(8)).timestamp(),
    };
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let response = h
        .server
        .get("/api/datasets")
        .authorization_bearer(&expired)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

//=========================================================================================
// Datasets
//=========================================================================================

#[tokio::test]
async fn csv_upload_reports_counts_and_preview() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;

    let form = MultipartForm::new()
        .add_text("name", "people")
        .add_part(
            "file",
            Part::bytes(b"name,age\nA,1\nB,2".to_vec()).file_name("people.csv"),
        );
    let response = h
        .server
        .post("/api/datasets/upload")
        .authorization_bearer(&token)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["row_count"], 2);
    assert_eq!(body["column_count"], 2);
    assert_eq!(body["file_type"], "csv");
    let preview = body["data_preview"].as_array().unwrap();
    assert_eq!(preview.len(), 2);
    assert_eq!(preview[0]["name"], "A");
    assert_eq!(preview[1]["age"], "2");
}

#[tokio::test]
async fn json_and_txt_uploads_parse_per_format() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;

    let form = MultipartForm::new().add_text("name", "letters").add_part(
        "file",
        Part::bytes(br#"[{"a":1},{"a":2},{"a":3}]"#.to_vec()).file_name("letters.json"),
    );
    let response = h
        .server
        .post("/api/datasets/upload")
        .authorization_bearer(&token)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["row_count"], 3);
    assert_eq!(body["column_count"], 1);

    let form = MultipartForm::new().add_text("name", "lines").add_part(
        "file",
        Part::bytes(b"line1\n\nline2".to_vec()).file_name("lines.txt"),
    );
    let response = h
        .server
        .post("/api/datasets/upload")
        .authorization_bearer(&token)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["row_count"], 2);
    assert_eq!(body["column_count"], 1);
    assert_eq!(body["data_preview"][0]["text"], "line1");
}

#[tokio::test]
async fn unsupported_and_unparseable_uploads_are_rejected() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;

    let form = MultipartForm::new().add_text("name", "blob").add_part(
        "file",
        Part::bytes(b"whatever".to_vec()).file_name("blob.parquet"),
    );
    let response = h
        .server
        .post("/api/datasets/upload")
        .authorization_bearer(&token)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let form = MultipartForm::new().add_text("name", "broken").add_part(
        "file",
        Part::bytes(b"{not json".to_vec()).file_name("broken.json"),
    );
    let response = h
        .server
        .post("/api/datasets/upload")
        .authorization_bearer(&token)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dataset_listing_never_includes_full_rows() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;
    upload_csv(&h.server, &token).await;

    let response = h
        .server
        .get("/api/datasets")
        .authorization_bearer(&token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    let listing = body.as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert!(listing[0].get("full_data").is_none());
    assert!(listing[0].get("rows").is_none());
    assert_eq!(listing[0]["data_preview"].as_array().unwrap().len(), 2);
    assert_eq!(listing[0]["row_count"], 2);
}

//=========================================================================================
// Training
//=========================================================================================

#[tokio::test]
async fn training_completes_synchronously() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;
    let dataset_id = upload_csv(&h.server, &token).await;

    let response = h
        .server
        .post("/api/models/train")
        .authorization_bearer(&token)
        .form(&[
            ("dataset_id", dataset_id.to_string()),
            ("model_name", "helper".to_string()),
            ("custom_prompt", "You are a helpful assistant.".to_string()),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["model_type"], "test-model");
    assert!(body["completed_at"].as_str().is_some());
    assert_eq!(body["training_data"].as_array().unwrap().len(), 2);

    let listing = h
        .server
        .get("/api/models")
        .authorization_bearer(&token)
        .await;
    assert_eq!(listing.status_code(), StatusCode::OK);
    assert_eq!(listing.json::<Value>().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn training_against_foreign_dataset_is_not_found() {
    let h = setup();
    let owner_token = register(&h.server, "owner@example.com").await;
    let dataset_id = upload_csv(&h.server, &owner_token).await;

    let intruder_token = register(&h.server, "intruder@example.com").await;
    let response = h
        .server
        .post("/api/models/train")
        .authorization_bearer(&intruder_token)
        .form(&[
            ("dataset_id", dataset_id.to_string()),
            ("model_name", "stolen".to_string()),
            ("custom_prompt", "irrelevant".to_string()),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

//=========================================================================================
// Test / Deploy / Predict
//=========================================================================================

#[tokio::test]
async fn test_endpoint_passes_through_the_delegate() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;
    let dataset_id = upload_csv(&h.server, &token).await;
    let model_id = train(&h.server, &token, dataset_id).await;

    let response = h
        .server
        .post(&format!("/api/models/{}/test", model_id))
        .authorization_bearer(&token)
        .json(&json!({"input_text": "hello"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["output"], "[You are a helpful assistant.] hello");
    assert_eq!(body["confidence"], 0.95);
    assert!(body["processing_time"].as_f64().is_some());
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_endpoint_requires_a_configured_delegate() {
    let server = setup_without_chat();
    let token = register(&server, "a@example.com").await;
    let dataset_id = upload_csv(&server, &token).await;
    let model_id = train(&server, &token, dataset_id).await;

    let response = server
        .post(&format!("/api/models/{}/test", model_id))
        .authorization_bearer(&token)
        .json(&json!({"input_text": "hello"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn testing_a_foreign_model_is_not_found() {
    let h = setup();
    let owner_token = register(&h.server, "owner@example.com").await;
    let dataset_id = upload_csv(&h.server, &owner_token).await;
    let model_id = train(&h.server, &owner_token, dataset_id).await;

    let intruder_token = register(&h.server, "intruder@example.com").await;
    let response = h
        .server
        .post(&format!("/api/models/{}/test", model_id))
        .authorization_bearer(&intruder_token)
        .json(&json!({"input_text": "hello"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deploy_publishes_a_prediction_endpoint() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;
    let dataset_id = upload_csv(&h.server, &token).await;
    let model_id = train(&h.server, &token, dataset_id).await;

    let response = h
        .server
        .post(&format!("/api/models/{}/deploy", model_id))
        .authorization_bearer(&token)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["name"], "helper-api");
    assert_eq!(body["status"], "active");
    assert_eq!(body["usage_count"], 0);
    assert_eq!(
        body["api_endpoint"],
        format!("/models/{}/predict", model_id)
    );

    let listing = h
        .server
        .get("/api/models/deployed")
        .authorization_bearer(&token)
        .await;
    assert_eq!(listing.status_code(), StatusCode::OK);
    assert_eq!(listing.json::<Value>().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn predict_increments_usage_and_invokes_the_delegate_each_time() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;
    let dataset_id = upload_csv(&h.server, &token).await;
    let model_id = train(&h.server, &token, dataset_id).await;

    h.server
        .post(&format!("/api/models/{}/deploy", model_id))
        .authorization_bearer(&token)
        .await;

    for _ in 0..2 {
        let response = h
            .server
            .post(&format!("/api/models/{}/predict", model_id))
            .authorization_bearer(&token)
            .json(&json!({"input_text": "hi"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    // One delegate call per request, no caching.
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 2);

    let stats = h
        .server
        .get("/api/dashboard/stats")
        .authorization_bearer(&token)
        .await;
    let body: Value = stats.json();
    assert_eq!(body["api_calls"], 2);
}

#[tokio::test]
async fn duplicate_deployments_count_each_prediction_once() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;
    let dataset_id = upload_csv(&h.server, &token).await;
    let model_id = train(&h.server, &token, dataset_id).await;

    // Deploying the same model twice is allowed and yields two deployments.
    for _ in 0..2 {
        let response = h
            .server
            .post(&format!("/api/models/{}/deploy", model_id))
            .authorization_bearer(&token)
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let response = h
        .server
        .post(&format!("/api/models/{}/predict", model_id))
        .authorization_bearer(&token)
        .json(&json!({"input_text": "hi"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // The bump lands on a single deployment, so the aggregate is 1, not 2.
    let stats = h
        .server
        .get("/api/dashboard/stats")
        .authorization_bearer(&token)
        .await;
    let body: Value = stats.json();
    assert_eq!(body["deployed"], 2);
    assert_eq!(body["api_calls"], 1);
}

#[tokio::test]
async fn predict_without_a_deployment_is_not_found() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;
    let dataset_id = upload_csv(&h.server, &token).await;
    let model_id = train(&h.server, &token, dataset_id).await;

    let response = h
        .server
        .post(&format!("/api/models/{}/predict", model_id))
        .authorization_bearer(&token)
        .json(&json!({"input_text": "hi"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
}

//=========================================================================================
// Dashboard
//=========================================================================================

#[tokio::test]
async fn dashboard_counts_are_scoped_to_the_caller() {
    let h = setup();
    let token = register(&h.server, "a@example.com").await;
    let dataset_id = upload_csv(&h.server, &token).await;
    let model_id = train(&h.server, &token, dataset_id).await;
    h.server
        .post(&format!("/api/models/{}/deploy", model_id))
        .authorization_bearer(&token)
        .await;

    let other_token = register(&h.server, "b@example.com").await;
    upload_csv(&h.server, &other_token).await;

    let stats = h
        .server
        .get("/api/dashboard/stats")
        .authorization_bearer(&token)
        .await;
    assert_eq!(stats.status_code(), StatusCode::OK);
    let body: Value = stats.json();
    assert_eq!(body["datasets"], 1);
    assert_eq!(body["models"], 1);
    assert_eq!(body["deployed"], 1);
    assert_eq!(body["api_calls"], 0);

    let other_stats = h
        .server
        .get("/api/dashboard/stats")
        .authorization_bearer(&other_token)
        .await;
    let body: Value = other_stats.json();
    assert_eq!(body["datasets"], 1);
    assert_eq!(body["models"], 0);
    assert_eq!(body["deployed"], 0);
}
