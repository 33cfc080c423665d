//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use model_studio_core::ports::{ChatCompletionService, DatabaseService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    /// The inference delegate. `None` while no API key is configured; test and
    /// predict requests fail with 500 in that case.
    pub chat_adapter: Option<Arc<dyn ChatCompletionService>>,
}
