//! Periodic snapshot sampler

use super::MetricRecorder;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default time between snapshots
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Sample and persist a snapshot every `interval` until `cancel` fires
pub fn spawn_sampler(
    recorder: Arc<MetricRecorder>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = recorder.sample_system();
                    if let Err(e) = recorder.record_snapshot(snapshot).await {
                        log::warn!("failed to persist metrics snapshot: {}", e);
                    }
                }
            }
        }
        log::info!("metrics sampler stopped");
    })
}
