use crate::models::pool::Pool;
use crate::web3::contracts::core::error::{ContractError, ContractResult};
use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use log::debug;
use std::time::Duration;

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    contract PredictionMarket {
        event PoolCreated(
            uint256 indexed poolId,
            address indexed creator,
            uint256 targetPrice,
            uint256 stopLoss,
            uint256 endTime
        );
        event PoolFinalized(uint256 indexed poolId, uint256 finalPrice, bool outcome);

        function pools(uint256 poolId) external view returns (
            address creator,
            uint256 targetPrice,
            uint256 stopLoss,
            uint256 endTime,
            bool isFinalized,
            uint256 finalPrice,
            bool outcome
        );
        function getActivePools() external view returns (uint256[] memory);
        function createPool(uint256 targetPrice, uint256 stopLoss, uint256 duration) external;
        function resolvePool(uint256 poolId, uint256 finalPrice) external;
    }
}

/// Events emitted by the prediction market that the keeper cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    Created {
        pool_id: U256,
        creator: Address,
        target_price: U256,
        stop_loss: U256,
        end_time: U256,
    },
    Finalized {
        pool_id: U256,
        final_price: U256,
        outcome: bool,
    },
    Unknown(Option<B256>),
}

/// Gas settings applied to a write call. All values in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSettings {
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Clone)]
pub struct PredictionMarketContract<P: Provider + Clone> {
    instance: PredictionMarket::PredictionMarketInstance<P>,
}

impl<P: Provider + Clone> PredictionMarketContract<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            instance: PredictionMarket::new(address, provider),
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    pub fn provider(&self) -> &P {
        self.instance.provider()
    }

    /// Reads the pool record. A zero creator means the id was never used.
    pub async fn get_pool(&self, pool_id: U256) -> ContractResult<Option<Pool>> {
        let info = self
            .instance
            .pools(pool_id)
            .call()
            .await
            .map_err(|e| ContractError::CallError(format!("pools({pool_id}): {e}")))?;

        if info.creator == Address::ZERO {
            debug!("Pool {pool_id} does not exist");
            return Ok(None);
        }

        Ok(Some(Pool {
            pool_id,
            creator: info.creator,
            target_price: info.targetPrice,
            stop_loss: info.stopLoss,
            end_time: info.endTime,
            is_finalized: info.isFinalized,
            final_price: info.isFinalized.then_some(info.finalPrice),
            outcome: info.isFinalized.then_some(info.outcome),
        }))
    }

    pub async fn get_active_pool_ids(&self) -> ContractResult<Vec<U256>> {
        self.instance
            .getActivePools()
            .call()
            .await
            .map_err(|e| ContractError::CallError(format!("getActivePools(): {e}")))
    }

    pub async fn estimate_resolve_gas(
        &self,
        from: Address,
        pool_id: U256,
        final_price: U256,
    ) -> ContractResult<u64> {
        self.instance
            .resolvePool(pool_id, final_price)
            .from(from)
            .estimate_gas()
            .await
            .map_err(|e| ContractError::GasEstimationError(e.to_string()))
    }

    /// Broadcasts `resolvePool` and returns once the node accepted it.
    /// Inclusion in a block is not awaited.
    pub async fn resolve_pool(
        &self,
        from: Address,
        pool_id: U256,
        final_price: U256,
        settings: TxSettings,
    ) -> ContractResult<TxHash> {
        let pending = self
            .instance
            .resolvePool(pool_id, final_price)
            .from(from)
            .nonce(settings.nonce)
            .gas(settings.gas_limit)
            .max_fee_per_gas(settings.max_fee_per_gas)
            .max_priority_fee_per_gas(settings.max_priority_fee_per_gas)
            .send()
            .await
            .map_err(ContractError::from_send_error)?;

        Ok(*pending.tx_hash())
    }

    /// Creates a pool and waits for the receipt.
    pub async fn create_pool(
        &self,
        from: Address,
        target_price: U256,
        stop_loss: U256,
        duration: U256,
        settings: TxSettings,
    ) -> ContractResult<TxHash> {
        let pending = self
            .instance
            .createPool(target_price, stop_loss, duration)
            .from(from)
            .nonce(settings.nonce)
            .gas(settings.gas_limit)
            .max_fee_per_gas(settings.max_fee_per_gas)
            .max_priority_fee_per_gas(settings.max_priority_fee_per_gas)
            .send()
            .await
            .map_err(ContractError::from_send_error)?;

        let tx_hash = *pending.tx_hash();
        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| ContractError::TransactionError(format!("{tx_hash}: {e}")))?;

        if !ReceiptResponse::status(&receipt) {
            return Err(ContractError::TransactionReverted(tx_hash.to_string()));
        }
        Ok(tx_hash)
    }

    pub async fn estimate_create_gas(
        &self,
        from: Address,
        target_price: U256,
        stop_loss: U256,
        duration: U256,
    ) -> ContractResult<u64> {
        self.instance
            .createPool(target_price, stop_loss, duration)
            .from(from)
            .estimate_gas()
            .await
            .map_err(|e| ContractError::GasEstimationError(e.to_string()))
    }

    pub async fn latest_block(&self) -> ContractResult<u64> {
        self.provider()
            .get_block_number()
            .await
            .map_err(|e| ContractError::CallError(format!("eth_blockNumber: {e}")))
    }

    /// Fetches and decodes contract events in the inclusive block range.
    pub async fn get_events(&self, from_block: u64, to_block: u64) -> ContractResult<Vec<PoolEvent>> {
        let filter = Filter::new()
            .address(self.address())
            .from_block(from_block)
            .to_block(to_block);
        let logs = self
            .provider()
            .get_logs(&filter)
            .await
            .map_err(|e| ContractError::CallError(format!("eth_getLogs: {e}")))?;

        logs.iter().map(decode_event).collect()
    }
}

pub fn decode_event(log: &Log) -> ContractResult<PoolEvent> {
    let topic = log.topics().first().copied();

    if topic == Some(PredictionMarket::PoolCreated::SIGNATURE_HASH) {
        let event = log
            .log_decode::<PredictionMarket::PoolCreated>()
            .map_err(|e| ContractError::DecodingError(format!("PoolCreated: {e}")))?
            .inner
            .data;
        return Ok(PoolEvent::Created {
            pool_id: event.poolId,
            creator: event.creator,
            target_price: event.targetPrice,
            stop_loss: event.stopLoss,
            end_time: event.endTime,
        });
    }

    if topic == Some(PredictionMarket::PoolFinalized::SIGNATURE_HASH) {
        let event = log
            .log_decode::<PredictionMarket::PoolFinalized>()
            .map_err(|e| ContractError::DecodingError(format!("PoolFinalized: {e}")))?
            .inner
            .data;
        return Ok(PoolEvent::Finalized {
            pool_id: event.poolId,
            final_price: event.finalPrice,
            outcome: event.outcome,
        });
    }

    Ok(PoolEvent::Unknown(topic))
}
