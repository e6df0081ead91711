use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::scheduler::SchedulerHandle;
use crate::store::DashboardStore;
use shared::{DashboardView, HealthStatus};

pub struct AppState {
    pub store: Arc<DashboardStore>,
    pub scheduler: SchedulerHandle,
    pub chart_path: PathBuf,
    pub quote_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub error_count: u32,
    pub last_update: String,
    pub last_successful_update: Option<String>,
}

impl From<&DashboardView> for HealthResponse {
    fn from(view: &DashboardView) -> Self {
        HealthResponse {
            status: view.status,
            error_count: view.error_count,
            last_update: view.last_update.clone(),
            last_successful_update: view.last_successful_update.clone(),
        }
    }
}
