use alloy::primitives::utils::format_ether;
use alloy::primitives::{TxHash, U256};
use log::{error, info, warn};
use shared::models::pool::EvaluationOutcome;
use std::collections::HashSet;
use std::sync::Arc;

use crate::dispatcher::FinalizationDispatcher;
use crate::error::KeeperError;
use crate::gateway::PoolReader;
use crate::locks::PoolLocks;
use crate::price::PriceSource;

/// Decides whether any candidate pool has to be finalized and submits at
/// most one finalize per pass.
///
/// Only the first qualifying pool in candidate order is acted on, even when
/// several qualify at once. The remaining pools are picked up by later
/// passes; this caps the keeper at one finalize transaction per trigger.
#[derive(Clone)]
pub struct PoolEvaluator {
    price_source: Arc<dyn PriceSource>,
    pools: Arc<dyn PoolReader>,
    dispatcher: FinalizationDispatcher,
    locks: PoolLocks,
}

impl PoolEvaluator {
    pub fn new(
        price_source: Arc<dyn PriceSource>,
        pools: Arc<dyn PoolReader>,
        dispatcher: FinalizationDispatcher,
        locks: PoolLocks,
    ) -> Self {
        Self {
            price_source,
            pools,
            dispatcher,
            locks,
        }
    }

    /// Checks one pool, or every active pool when `pool_id` is `None`.
    pub async fn evaluate_and_finalize(
        &self,
        pool_id: Option<U256>,
    ) -> Result<EvaluationOutcome, KeeperError> {
        self.evaluate_at(pool_id, unix_now()).await
    }

    pub async fn evaluate_at(
        &self,
        pool_id: Option<U256>,
        now: u64,
    ) -> Result<EvaluationOutcome, KeeperError> {
        let price = self.price_source.current_price().await?;

        let candidates = match pool_id {
            Some(id) => match self.pools.get_pool(id).await {
                Ok(Some(_)) => vec![id],
                Ok(None) => {
                    error!("Pool {id} not found.");
                    return Err(KeeperError::PoolNotFound(id));
                }
                Err(e) => return Err(KeeperError::UnknownContractState(e)),
            },
            None => self
                .pools
                .list_active_pool_ids()
                .await
                .map_err(KeeperError::UnknownContractState)?,
        };

        let single = pool_id.is_some();
        let mut seen = HashSet::new();
        for id in candidates {
            if !seen.insert(id) {
                continue;
            }

            let _guard = self.locks.lock(id).await;

            // The candidate list may be stale; only a fresh read decides.
            let pool = match self.pools.get_pool(id).await {
                Ok(Some(pool)) => pool,
                Ok(None) if single => return Err(KeeperError::PoolNotFound(id)),
                Ok(None) => {
                    warn!("Pool {id} listed as active but not found. Skipping...");
                    continue;
                }
                Err(e) if single => return Err(KeeperError::UnknownContractState(e)),
                Err(e) => {
                    error!("Error retrieving pool {id}: {e}. Skipping...");
                    continue;
                }
            };

            if pool.is_finalized {
                info!("Pool {id} is already finalized. Skipping...");
                continue;
            }

            let Some(reason) = pool.finalize_reason(price, now) else {
                info!(
                    "Conditions not met yet for pool {id}. Current price: {}",
                    format_ether(price)
                );
                continue;
            };

            info!("Pool {id} finalizing: {reason}");
            let tx_hash = self.dispatcher.dispatch(id, price).await?;
            return Ok(EvaluationOutcome::Finalized {
                pool_id: id,
                reason,
                price,
                tx_hash,
            });
        }

        Ok(EvaluationOutcome::NoAction)
    }

    /// Finalizes a pool on request, at `price` or the current price.
    /// Conditions are not checked, but the pool must exist and still be open.
    pub async fn finalize_pool(
        &self,
        pool_id: U256,
        price: Option<U256>,
    ) -> Result<TxHash, KeeperError> {
        let price = match price {
            Some(price) => price,
            None => self.price_source.current_price().await?,
        };

        let _guard = self.locks.lock(pool_id).await;
        let pool = self
            .pools
            .get_pool(pool_id)
            .await
            .map_err(KeeperError::UnknownContractState)?
            .ok_or(KeeperError::PoolNotFound(pool_id))?;

        if pool.is_finalized {
            return Err(KeeperError::AlreadyFinalized(pool_id));
        }

        self.dispatcher.dispatch(pool_id, price).await
    }
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DEFAULT_PRIORITY_FEE_WEI;
    use crate::tests::helper::{active_pool, eth, FakeChain, FakePriceSource, END_TIME};
    use shared::models::pool::FinalizeReason;

    const BEFORE: u64 = END_TIME - 60;
    const AFTER: u64 = END_TIME + 60;

    fn evaluator(chain: &Arc<FakeChain>, price: U256) -> PoolEvaluator {
        evaluator_with_source(chain, Arc::new(FakePriceSource::new(price)))
    }

    fn evaluator_with_source(chain: &Arc<FakeChain>, source: Arc<FakePriceSource>) -> PoolEvaluator {
        PoolEvaluator::new(
            source,
            chain.clone(),
            FinalizationDispatcher::new(chain.clone(), DEFAULT_PRIORITY_FEE_WEI),
            PoolLocks::new(),
        )
    }

    fn finalized_reason(outcome: EvaluationOutcome) -> (U256, FinalizeReason) {
        match outcome {
            EvaluationOutcome::Finalized {
                pool_id, reason, ..
            } => (pool_id, reason),
            EvaluationOutcome::NoAction => panic!("expected a finalize decision"),
        }
    }

    #[tokio::test]
    async fn test_price_at_target_finalizes() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        let outcome = evaluator(&chain, eth(3000))
            .evaluate_at(None, BEFORE)
            .await
            .unwrap();

        assert_eq!(
            finalized_reason(outcome),
            (U256::from(1), FinalizeReason::TargetReached)
        );
        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].price, eth(3000));
    }

    #[tokio::test]
    async fn test_price_at_stop_loss_finalizes() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        let outcome = evaluator(&chain, eth(2500))
            .evaluate_at(None, BEFORE)
            .await
            .unwrap();

        assert_eq!(
            finalized_reason(outcome),
            (U256::from(1), FinalizeReason::StopLossHit)
        );
    }

    #[tokio::test]
    async fn test_expired_pool_finalizes() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        let outcome = evaluator(&chain, eth(2700))
            .evaluate_at(None, AFTER)
            .await
            .unwrap();

        assert_eq!(
            finalized_reason(outcome),
            (U256::from(1), FinalizeReason::Expired)
        );
    }

    #[tokio::test]
    async fn test_inside_band_before_deadline_is_no_action() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1), active_pool(2)]));
        let outcome = evaluator(&chain, eth(2700))
            .evaluate_at(None, BEFORE)
            .await
            .unwrap();

        assert_eq!(outcome, EvaluationOutcome::NoAction);
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_finalized_pool_is_never_submitted() {
        let mut finalized = active_pool(1);
        finalized.is_finalized = true;
        finalized.final_price = Some(eth(3100));
        finalized.outcome = Some(true);
        let chain = Arc::new(FakeChain::with_pools(vec![finalized]));

        let outcome = evaluator(&chain, eth(5000))
            .evaluate_at(None, AFTER)
            .await
            .unwrap();

        assert_eq!(outcome, EvaluationOutcome::NoAction);
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_only_first_qualifying_pool_is_finalized() {
        let chain = Arc::new(FakeChain::with_pools(vec![
            active_pool(1),
            active_pool(2),
            active_pool(3),
        ]));

        let outcome = evaluator(&chain, eth(3500))
            .evaluate_at(None, BEFORE)
            .await
            .unwrap();

        assert_eq!(finalized_reason(outcome).0, U256::from(1));
        assert_eq!(chain.sent().len(), 1);
        assert!(!chain.pool(2).unwrap().is_finalized);
        assert!(!chain.pool(3).unwrap().is_finalized);
    }

    #[tokio::test]
    async fn test_duplicate_candidates_are_checked_once() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1), active_pool(2)]));
        chain.set_active(vec![1, 1, 2, 1]);

        let outcome = evaluator(&chain, eth(2700))
            .evaluate_at(None, BEFORE)
            .await
            .unwrap();

        assert_eq!(outcome, EvaluationOutcome::NoAction);
        assert_eq!(chain.reads(1), 1);
        assert_eq!(chain.reads(2), 1);
    }

    #[tokio::test]
    async fn test_stale_candidate_is_rechecked_before_finalize() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        // The existence check for pool 1 sees it open, the fresh re-read
        // sees the finalize that landed in between.
        chain.finalize_after_first_read(1);

        let result = evaluator(&chain, eth(3000))
            .evaluate_at(Some(U256::from(1)), BEFORE)
            .await
            .unwrap();

        assert_eq!(result, EvaluationOutcome::NoAction);
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_passes_submit_once() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        let evaluator = evaluator(&chain, eth(3000));

        let (first, second) = tokio::join!(
            evaluator.evaluate_at(None, BEFORE),
            evaluator.evaluate_at(None, BEFORE)
        );

        let outcomes = [first.unwrap(), second.unwrap()];
        let finalized = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, EvaluationOutcome::Finalized { .. }))
            .count();
        assert_eq!(finalized, 1);
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_price_unavailable_aborts_without_reads() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        let evaluator = evaluator_with_source(&chain, Arc::new(FakePriceSource::unavailable()));

        let result = evaluator.evaluate_at(None, AFTER).await;

        assert!(matches!(result, Err(KeeperError::PriceUnavailable(_))));
        assert_eq!(chain.reads(1), 0);
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_pool_id_is_not_found() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));

        let result = evaluator(&chain, eth(3000))
            .evaluate_at(Some(U256::from(42)), BEFORE)
            .await;

        assert!(matches!(result, Err(KeeperError::PoolNotFound(id)) if id == U256::from(42)));
    }

    #[tokio::test]
    async fn test_broken_read_skips_pool_in_full_pass() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1), active_pool(2)]));
        chain.break_reads(1);

        let outcome = evaluator(&chain, eth(3000))
            .evaluate_at(None, BEFORE)
            .await
            .unwrap();

        assert_eq!(finalized_reason(outcome).0, U256::from(2));
    }

    #[tokio::test]
    async fn test_broken_read_for_single_pool_is_unknown_state() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        chain.break_reads(1);

        let result = evaluator(&chain, eth(3000))
            .evaluate_at(Some(U256::from(1)), BEFORE)
            .await;

        assert!(matches!(result, Err(KeeperError::UnknownContractState(_))));
    }

    #[tokio::test]
    async fn test_listing_failure_is_unknown_state() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        chain.fail_list("connection refused");

        let result = evaluator(&chain, eth(3000)).evaluate_at(None, BEFORE).await;

        assert!(matches!(result, Err(KeeperError::UnknownContractState(_))));
    }

    #[tokio::test]
    async fn test_insufficient_funds_surfaces_from_pass() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        chain.set_balance(U256::ZERO);

        let result = evaluator(&chain, eth(3000)).evaluate_at(None, BEFORE).await;

        assert!(matches!(result, Err(KeeperError::InsufficientFunds { .. })));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_manual_finalize_uses_given_price() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));

        evaluator(&chain, eth(2700))
            .finalize_pool(U256::from(1), Some(eth(2800)))
            .await
            .unwrap();

        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].price, eth(2800));
    }

    #[tokio::test]
    async fn test_manual_finalize_refuses_finalized_pool() {
        let chain = Arc::new(FakeChain::with_pools(vec![active_pool(1)]));
        let evaluator = evaluator(&chain, eth(2700));

        evaluator.finalize_pool(U256::from(1), None).await.unwrap();
        let second = evaluator.finalize_pool(U256::from(1), None).await;

        assert!(matches!(second, Err(KeeperError::AlreadyFinalized(_))));
        assert_eq!(chain.sent().len(), 1);
    }
}
