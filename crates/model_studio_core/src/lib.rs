pub mod domain;
pub mod ingest;
pub mod ports;

pub use domain::{
    DashboardStats, Dataset, DeployedModel, DeploymentStatus, FileType, ModelTraining, Row,
    TrainingStatus, User, UserCredentials,
};
pub use ingest::{IngestError, ParsedUpload};
pub use ports::{ChatCompletionService, DatabaseService, PortError, PortResult};
