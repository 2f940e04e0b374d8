use alloy::primitives::utils::format_ether;
use alloy::providers::Provider;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use shared::web3::contracts::core::error::ContractResult;
use shared::web3::contracts::implementations::prediction_market_contract::{
    PoolEvent, PredictionMarketContract,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::block_tracker::BlockTracker;
use crate::gateway::PoolReader;
use crate::utils::loop_heartbeats::LoopHeartbeats;

/// Upper bound on blocks per `eth_getLogs` request.
const MAX_BLOCK_RANGE: u64 = 2_000;

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn latest_block(&self) -> ContractResult<u64>;

    async fn events(&self, from_block: u64, to_block: u64) -> ContractResult<Vec<PoolEvent>>;
}

#[async_trait]
impl<P: Provider + Clone + 'static> EventSource for PredictionMarketContract<P> {
    async fn latest_block(&self) -> ContractResult<u64> {
        PredictionMarketContract::latest_block(self).await
    }

    async fn events(&self, from_block: u64, to_block: u64) -> ContractResult<Vec<PoolEvent>> {
        self.get_events(from_block, to_block).await
    }
}

/// Follows `PoolCreated` and `PoolFinalized` events and records progress in
/// the block marker after every handled range.
pub struct EventMonitor {
    source: Arc<dyn EventSource>,
    pools: Arc<dyn PoolReader>,
    tracker: BlockTracker,
    poll_interval: Duration,
    heartbeats: Arc<LoopHeartbeats>,
    cancel_token: CancellationToken,
    last_processed: Option<u64>,
}

impl EventMonitor {
    pub fn new(
        source: Arc<dyn EventSource>,
        pools: Arc<dyn PoolReader>,
        tracker: BlockTracker,
        poll_interval: Duration,
        heartbeats: Arc<LoopHeartbeats>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            pools,
            tracker,
            poll_interval,
            heartbeats,
            cancel_token,
            last_processed: None,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        self.last_processed = self.tracker.load().await?;
        match self.last_processed {
            Some(block) => info!("Resuming event monitor after block {block}"),
            None => info!("No block marker found, event monitor starts at the chain head"),
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.poll().await {
                        error!("Error in event monitor: {e:#}");
                    }
                    self.heartbeats.update_event_monitor();
                }
                _ = self.cancel_token.cancelled() => {
                    info!("Event monitor cancelled, shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Handles the next block range up to the current head and returns the
    /// number of decoded events.
    pub async fn poll(&mut self) -> Result<usize> {
        let head = self.source.latest_block().await?;
        let from = match self.last_processed {
            Some(last) => last + 1,
            None => head,
        };
        if from > head {
            return Ok(0);
        }
        let to = head.min(from + MAX_BLOCK_RANGE - 1);

        let events = self.source.events(from, to).await?;
        debug!("Fetched {} events from blocks {from}..={to}", events.len());
        for event in &events {
            self.handle_event(event).await;
        }

        self.tracker.store(to).await?;
        self.last_processed = Some(to);
        Ok(events.len())
    }

    async fn handle_event(&self, event: &PoolEvent) {
        match event {
            PoolEvent::Created {
                pool_id,
                creator,
                target_price,
                stop_loss,
                end_time,
            } => {
                match self.pools.get_pool(*pool_id).await {
                    Ok(Some(pool)) if pool.is_finalized => {
                        debug!("Pool {pool_id} created and already finalized");
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Could not read created pool {pool_id}: {e}"),
                }
                info!(
                    "Event listener: Pool Created: Pool ID: {pool_id}, Creator: {creator}, Target Price: {}, Stop Loss: {}, End Time: {end_time}",
                    format_ether(*target_price),
                    format_ether(*stop_loss)
                );
            }
            PoolEvent::Finalized {
                pool_id,
                final_price,
                outcome,
            } => {
                info!(
                    "Event listener: Pool Finalized: Pool ID: {pool_id}, Final Price: {}, Outcome: {outcome}",
                    format_ether(*final_price)
                );
            }
            PoolEvent::Unknown(topic) => {
                warn!("Event listener: Unhandled event type: {topic:?}");
            }
        }
    }
}
