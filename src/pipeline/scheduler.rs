// src/pipeline/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::Pipeline;

/// Run a cycle immediately and then every `interval`, until `shutdown` flips to true
/// (or its sender is dropped). A cycle in flight is finished before stopping.
pub fn spawn_scheduler(
    pipeline: Arc<Pipeline>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }

            counter!("pipeline_runs_total").increment(1);
            if let Err(e) = pipeline.run_cycle().await {
                tracing::warn!(target: "pipeline", error = %e, "cycle aborted: sources unavailable");
            }
        }
        tracing::info!(target: "pipeline", "scheduler stopped");
    })
}
