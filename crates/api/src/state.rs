use std::sync::Arc;

use services::AppServices;

use crate::config::AppConfig;

pub struct AppState {
    pub services: AppServices,
    pub config: AppConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    #[must_use]
    pub fn new(services: AppServices, config: AppConfig) -> SharedState {
        Arc::new(Self { services, config })
    }
}
