use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::evaluator::Evaluator;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Refresh exchange rates now and then every `interval` until `cancel` fires.
/// Refreshes run on the worker's background lane.
pub fn spawn_rate_refresher(
    evaluator: Arc<Evaluator>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if evaluator.refresh_rates().await {
                        tracing::info!("exchange rates refreshed");
                    } else {
                        tracing::debug!("exchange rates not refreshed");
                    }
                }
            }
        }
    })
}
