use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use sitepulse_kpi::KpiCalculator;
use sitepulse_storage::KpiStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<KpiStore>,
    pub calculator: Arc<KpiCalculator>,
    pub config: Arc<ServerConfig>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<KpiStore>, config: ServerConfig) -> Self {
        Self {
            store,
            calculator: Arc::new(KpiCalculator::standard()),
            config: Arc::new(config),
            start_time: Utc::now(),
        }
    }
}
