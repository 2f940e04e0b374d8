use alloy::primitives::utils::format_ether;
use alloy::primitives::{TxHash, U256};
use log::{error, info};
use std::sync::Arc;

use crate::error::KeeperError;
use crate::gateway::{FeeBid, FinalizeGateway};

/// Priority tip added on top of the network gas price: 2 gwei.
pub const DEFAULT_PRIORITY_FEE_WEI: u128 = 2_000_000_000;

/// Submits the one-time `resolvePool` transition for a pool.
///
/// Success means the node accepted the transaction, not that it was mined.
/// The contract is expected to reject a second finalize for the same pool;
/// this type does not track what it already submitted.
#[derive(Clone)]
pub struct FinalizationDispatcher {
    gateway: Arc<dyn FinalizeGateway>,
    priority_fee: u128,
}

impl FinalizationDispatcher {
    pub fn new(gateway: Arc<dyn FinalizeGateway>, priority_fee: u128) -> Self {
        Self {
            gateway,
            priority_fee,
        }
    }

    pub async fn fee_bid(&self) -> Result<FeeBid, KeeperError> {
        let base_fee = self
            .gateway
            .base_fee_per_gas()
            .await
            .map_err(KeeperError::SubmissionFailed)?;

        Ok(FeeBid {
            max_fee_per_gas: base_fee.saturating_add(self.priority_fee),
            max_priority_fee_per_gas: self.priority_fee,
        })
    }

    /// Caller must have seen the pool as not finalized on its latest read.
    pub async fn dispatch(&self, pool_id: U256, price: U256) -> Result<TxHash, KeeperError> {
        let fees = self.fee_bid().await?;

        let gas_estimate = self
            .gateway
            .estimate_finalize_gas(pool_id, price)
            .await
            .map_err(|e| {
                error!("Error estimating gas to finalize pool {pool_id}: {e}");
                KeeperError::SubmissionFailed(e)
            })?;

        let balance = self
            .gateway
            .account_balance()
            .await
            .map_err(KeeperError::SubmissionFailed)?;

        let required = U256::from(gas_estimate) * U256::from(fees.max_fee_per_gas);
        if balance < required {
            error!(
                "Insufficient funds for gas. Required: {} ETH, Available: {} ETH",
                format_ether(required),
                format_ether(balance)
            );
            return Err(KeeperError::InsufficientFunds {
                required,
                available: balance,
            });
        }

        match self
            .gateway
            .send_finalize(pool_id, price, gas_estimate, fees)
            .await
        {
            Ok(tx_hash) => {
                info!("Pool {pool_id} finalize submitted. Transaction hash: {tx_hash}");
                Ok(tx_hash)
            }
            Err(e) => {
                error!("Error finalizing pool {pool_id}: {e}");
                Err(KeeperError::SubmissionFailed(e))
            }
        }
    }
}
