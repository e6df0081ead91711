use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::coordinator::{CycleOutcome, RefreshCoordinator};

enum Command {
    /// Run a cycle unless one has already completed, then reply.
    RefreshIfEmpty(oneshot::Sender<()>),
}

/// Cheap handle for request handlers to reach the background refresh task.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Waits until at least one cycle has completed, running it on the
    /// background task if needed. Returns false if the scheduler is gone.
    pub async fn ensure_initialized(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::RefreshIfEmpty(tx)).await.is_err() {
            warn!("Refresh scheduler is not running");
            return false;
        }
        rx.await.is_ok()
    }
}

/// Owns the single background task that runs refresh cycles, one at a time.
pub struct Scheduler {
    handle: SchedulerHandle,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Scheduler {
    /// Starts the loop. The first timed cycle fires one `period` from now;
    /// earlier data comes from `ensure_initialized`.
    pub fn start(coordinator: Arc<RefreshCoordinator>, period: Duration) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_loop(coordinator, period, commands_rx, shutdown_rx));
        info!("Refresh scheduler started with interval {}s", period.as_secs());

        Scheduler {
            handle: SchedulerHandle { commands: commands_tx },
            shutdown: shutdown_tx,
            task,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stops the timer and waits for the loop to exit. An in-flight cycle is
    /// abandoned; the store only ever holds whole committed states.
    pub async fn shutdown(self) {
        info!("Stopping refresh scheduler");
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Refresh scheduler ended abnormally: {}", e);
        }
        info!("Refresh scheduler stopped");
    }
}

async fn run_loop(
    coordinator: Arc<RefreshCoordinator>,
    period: Duration,
    mut commands: mpsc::Receiver<Command>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                if !run_guarded(&coordinator, &mut shutdown).await {
                    break;
                }
                // Next timed cycle is a full period after this one ended
                interval.reset();
            }
            command = commands.recv() => match command {
                Some(Command::RefreshIfEmpty(reply)) => {
                    if !coordinator.store().has_completed_cycle() {
                        info!("No data yet, running an immediate refresh");
                        if !run_guarded(&coordinator, &mut shutdown).await {
                            break;
                        }
                        interval.reset();
                    }
                    let _ = reply.send(());
                }
                None => break,
            },
        }
    }
}

/// Runs one cycle unless shutdown arrives first. Returns false on shutdown.
async fn run_guarded(coordinator: &Arc<RefreshCoordinator>, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        outcome = coordinator.run_cycle() => {
            match outcome {
                CycleOutcome::Complete => {}
                CycleOutcome::Partial { missing } => warn!("Refresh cycle finished without {}", missing.join(", ")),
                CycleOutcome::Failed(reason) => warn!("Refresh cycle failed: {}", reason),
            }
            true
        }
        _ = shutdown.changed() => {
            warn!("Shutdown requested, abandoning in-flight refresh cycle");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::testing::{ScriptedSource, Step};
    use crate::coordinator::testing::{ChartBehavior, RecordingChart};
    use crate::coordinator::CycleSettings;
    use crate::store::DashboardStore;
    use shared::{Asset, PriceSnapshot, PriceValue};

    fn test_assets() -> Vec<Asset> {
        ["bitcoin", "ethereum", "solana"]
            .iter()
            .map(|id| Asset::from_id(id))
            .collect()
    }

    fn setup(sample_count: usize) -> (Arc<RefreshCoordinator>, Arc<ScriptedSource>) {
        let assets = test_assets();
        let source = Arc::new(ScriptedSource::new(
            assets.clone(),
            vec![Step::Snapshot(PriceSnapshot::filled(&assets, PriceValue::Price(10.0)))],
        ));
        let coordinator = Arc::new(RefreshCoordinator::new(
            source.clone(),
            Arc::new(RecordingChart::new(ChartBehavior::Succeed)),
            Arc::new(DashboardStore::new(&assets)),
            CycleSettings {
                sample_count,
                sample_interval: Duration::from_secs(2),
                degraded_threshold: 3,
            },
        ));
        (coordinator, source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_access_runs_exactly_one_cycle() {
        let (coordinator, source) = setup(0);
        let scheduler = Scheduler::start(coordinator.clone(), Duration::from_secs(300));
        let handle = scheduler.handle();

        // concurrent first loads coalesce into one cycle
        let (a, b) = tokio::join!(handle.ensure_initialized(), handle.ensure_initialized());
        assert!(a && b);
        assert_eq!(source.calls(), 1);
        assert_eq!(coordinator.store().snapshot().cycles_completed, 1);

        // later loads within the interval do not refresh again
        assert!(handle.ensure_initialized().await);
        assert_eq!(source.calls(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_drives_cycles() {
        let (coordinator, source) = setup(0);
        let scheduler = Scheduler::start(coordinator.clone(), Duration::from_secs(300));

        time::sleep(Duration::from_secs(299)).await;
        assert_eq!(source.calls(), 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.calls(), 1);

        time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(coordinator.store().snapshot().cycles_completed, 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_never_overlap() {
        // each cycle spends 4 x 100s sampling, longer than the 150s period
        let (coordinator, source) = {
            let assets = test_assets();
            let source = Arc::new(ScriptedSource::new(
                assets.clone(),
                vec![Step::Snapshot(PriceSnapshot::filled(&assets, PriceValue::Price(10.0)))],
            ));
            let coordinator = Arc::new(RefreshCoordinator::new(
                source.clone(),
                Arc::new(RecordingChart::new(ChartBehavior::Succeed)),
                Arc::new(DashboardStore::new(&assets)),
                CycleSettings {
                    sample_count: 5,
                    sample_interval: Duration::from_secs(100),
                    degraded_threshold: 3,
                },
            ));
            (coordinator, source)
        };
        let scheduler = Scheduler::start(coordinator.clone(), Duration::from_secs(150));

        // first tick at 150s, cycle runs until 550s; ticks at 300s and 450s are dropped
        time::sleep(Duration::from_secs(560)).await;
        assert_eq!(coordinator.store().snapshot().cycles_completed, 1);
        assert_eq!(source.calls(), 6);

        // no catch-up tick at 550s: the next cycle starts one period later, at 700s
        time::sleep(Duration::from_secs(130)).await;
        assert_eq!(coordinator.store().snapshot().cycles_completed, 1);

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(coordinator.store().snapshot().cycles_completed, 2);
        // latest snapshot plus the first sample of the second run
        assert_eq!(source.calls(), 8);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_eager_cycle_pushes_back_timer() {
        let (coordinator, source) = setup(0);
        let scheduler = Scheduler::start(coordinator.clone(), Duration::from_secs(300));
        let handle = scheduler.handle();

        time::sleep(Duration::from_secs(200)).await;
        assert!(handle.ensure_initialized().await);
        assert_eq!(source.calls(), 1);

        // the tick due at 300s now lands at 500s
        time::sleep(Duration::from_secs(150)).await;
        assert_eq!(source.calls(), 1);
        time::sleep(Duration::from_secs(160)).await;
        assert_eq!(source.calls(), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_timer() {
        let (coordinator, source) = setup(0);
        let scheduler = Scheduler::start(coordinator.clone(), Duration::from_secs(60));
        let handle = scheduler.handle();

        scheduler.shutdown().await;
        time::sleep(Duration::from_secs(600)).await;

        assert_eq!(source.calls(), 0);
        assert!(!handle.ensure_initialized().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_running_cycle() {
        let (coordinator, _) = setup(10);
        let scheduler = Scheduler::start(coordinator.clone(), Duration::from_secs(1));

        // let the first cycle commit its snapshot and start sampling
        time::sleep(Duration::from_secs(3)).await;
        scheduler.shutdown().await;

        let state = coordinator.store().snapshot();
        assert_eq!(state.cycles_completed, 1);
        assert_eq!(state.price_for("bitcoin"), PriceValue::Price(10.0));
    }
}
