use chrono::Local;
use log::{info, warn};
use std::time::Duration;

use crate::api::PriceSource;
use shared::{PriceHistory, PriceSample, TIME_FORMAT};

/// Calls the source `sample_count` times, `interval` apart, and keeps every
/// result. A degraded sample is recorded as-is; collection never stops early.
pub async fn collect_history(source: &dyn PriceSource, sample_count: usize, interval: Duration) -> PriceHistory {
    let mut history = PriceHistory::with_capacity(sample_count);

    for i in 0..sample_count {
        let captured_at = Local::now();
        info!(
            "Collecting sample {} of {} at {}",
            i + 1,
            sample_count,
            captured_at.format(TIME_FORMAT)
        );

        let snapshot = source.fetch_snapshot().await;
        if snapshot.is_all_unavailable() {
            warn!("Sample {} of {} has no prices, keeping it as degraded", i + 1, sample_count);
        }
        history.push(PriceSample { captured_at, snapshot });

        // No wait after the final sample
        if i + 1 < sample_count {
            tokio::time::sleep(interval).await;
        }
    }

    if sample_count > 0 {
        info!(
            "History collection completed: {} samples, {} degraded",
            history.len(),
            history.degraded_count()
        );
    }

    history
}
