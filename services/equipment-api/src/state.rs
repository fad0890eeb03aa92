use std::sync::Arc;

use equipment::DatasetService;

use crate::config::AppConfig;

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
pub struct AppState {
    pub datasets: DatasetService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(datasets: DatasetService, config: AppConfig) -> Self {
        Self { datasets, config }
    }

    pub fn is_known_token(&self, token: &str) -> bool {
        self.config.api_tokens.iter().any(|t| t == token)
    }
}
