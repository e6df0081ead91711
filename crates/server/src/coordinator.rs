use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::api::PriceSource;
use crate::chart::ChartSink;
use crate::error::CycleError;
use crate::history::collect_history;
use crate::store::{DashboardState, DashboardStore};
use shared::{HealthStatus, PriceHistory, PriceSnapshot, PriceValue, TIME_FORMAT};

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub sample_count: usize,
    pub sample_interval: Duration,
    /// Status turns degraded once the error counter exceeds this.
    pub degraded_threshold: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Complete,
    Partial { missing: Vec<String> },
    Failed(String),
}

/// Per-asset substitution: a fresh price wins, otherwise keep the last real
/// price, otherwise pass the incoming marker through.
pub fn resolve(previous: PriceValue, incoming: PriceValue) -> PriceValue {
    match (previous, incoming) {
        (_, PriceValue::Price(p)) => PriceValue::Price(p),
        (PriceValue::Price(p), _) => PriceValue::Price(p),
        (_, incoming) => incoming,
    }
}

/// Computes the post-cycle state from the pre-cycle state and a fresh snapshot.
pub fn reconcile(
    prev: &DashboardState,
    snapshot: &PriceSnapshot,
    now: DateTime<Local>,
    degraded_threshold: u32,
) -> DashboardState {
    let mut next = prev.clone();
    let missing = snapshot.missing();

    if missing.is_empty() {
        next.error_count = 0;
        next.status = HealthStatus::Ok;
        next.last_successful_update = Some(now);
        next.prices = snapshot.clone();
    } else {
        next.error_count = prev.error_count.saturating_add(1);
        warn!("Incomplete data received. Error count: {}", next.error_count);
        if next.error_count > degraded_threshold {
            next.status = HealthStatus::Degraded;
        }

        next.prices = PriceSnapshot::new(
            snapshot
                .iter()
                .map(|(asset, incoming)| {
                    let previous = prev.price_for(&asset.id);
                    (asset.clone(), resolve(previous, *incoming))
                })
                .collect(),
        );
    }

    next.last_update = Some(now);
    next.timestamp = now.timestamp();
    next.cycles_completed = prev.cycles_completed + 1;
    next
}

/// State after a cycle died unexpectedly: prices untouched, status error.
pub fn apply_failure(prev: &DashboardState) -> DashboardState {
    DashboardState {
        error_count: prev.error_count.saturating_add(1),
        status: HealthStatus::Error,
        ..prev.clone()
    }
}

pub struct RefreshCoordinator {
    source: Arc<dyn PriceSource>,
    chart: Arc<dyn ChartSink>,
    store: Arc<DashboardStore>,
    settings: CycleSettings,
}

impl RefreshCoordinator {
    pub fn new(
        source: Arc<dyn PriceSource>,
        chart: Arc<dyn ChartSink>,
        store: Arc<DashboardStore>,
        settings: CycleSettings,
    ) -> Self {
        RefreshCoordinator {
            source,
            chart,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<DashboardStore> {
        &self.store
    }

    /// Runs one refresh cycle. Whatever happens inside, the caller gets an
    /// outcome back; a panic is folded into the state as an error.
    pub async fn run_cycle(self: &Arc<Self>) -> CycleOutcome {
        info!("Starting data update");

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.cycle_body().await });
        // Dropping this future (shutdown) takes the in-flight cycle down with it
        let _abort_guard = AbortOnDrop(handle.abort_handle());

        match handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                let err = CycleError::from(join_error);
                let state = self.store.update(apply_failure);
                error!("Error during data update: {} (error count: {})", err, state.error_count);
                CycleOutcome::Failed(err.to_string())
            }
        }
    }

    async fn cycle_body(&self) -> CycleOutcome {
        let snapshot = self.source.fetch_snapshot().await;
        let now = Local::now();
        let threshold = self.settings.degraded_threshold;

        let state = self.store.update(|prev| reconcile(prev, &snapshot, now, threshold));

        let outcome = if snapshot.is_complete() {
            CycleOutcome::Complete
        } else {
            CycleOutcome::Partial {
                missing: snapshot.missing().iter().map(|a| a.id.clone()).collect(),
            }
        };

        let history = collect_history(
            self.source.as_ref(),
            self.settings.sample_count,
            self.settings.sample_interval,
        )
        .await;
        if !history.is_empty() {
            self.render_chart(history).await;
        }

        info!(
            "Data update completed at {} (status: {}, error count: {})",
            now.format(TIME_FORMAT),
            state.status,
            state.error_count
        );
        outcome
    }

    async fn render_chart(&self, history: PriceHistory) {
        let chart = Arc::clone(&self.chart);
        let records = history.to_records();

        match tokio::task::spawn_blocking(move || chart.render(&records)).await {
            Ok(true) => {}
            Ok(false) => warn!("Chart rendering failed, keeping previous chart"),
            Err(e) => error!("Chart rendering task failed: {}", e),
        }
    }
}

struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
