use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::evaluator::PoolEvaluator;
use crate::utils::loop_heartbeats::LoopHeartbeats;

/// Periodically runs an evaluation pass over all active pools. Failures are
/// logged and retried on the next tick.
pub struct PoolCheckScheduler {
    evaluator: PoolEvaluator,
    interval: Duration,
    heartbeats: Arc<LoopHeartbeats>,
    cancel_token: CancellationToken,
}

impl PoolCheckScheduler {
    pub fn new(
        evaluator: PoolEvaluator,
        interval: Duration,
        heartbeats: Arc<LoopHeartbeats>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            evaluator,
            interval,
            heartbeats,
            cancel_token,
        }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Pool checks are running every {} seconds",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = self.cancel_token.cancelled() => {
                    info!("Pool check scheduler cancelled, shutting down");
                    break;
                }
            }
        }
    }

    async fn tick(&self) {
        match self.evaluator.evaluate_and_finalize(None).await {
            Ok(outcome) => info!("{}", outcome.message()),
            Err(e) => error!("Pool check failed ({}): {e}", e.kind()),
        }
        self.heartbeats.update_pool_checker();
    }
}
