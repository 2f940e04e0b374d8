use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use shared::models::pool::Pool;
use shared::web3::contracts::core::error::ContractResult;
use shared::web3::contracts::implementations::prediction_market_contract::{
    PredictionMarketContract, TxSettings,
};
use shared::web3::wallet::{Wallet, WalletProvider};

/// EIP-1559 fee bid in wei per gas unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBid {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[async_trait]
pub trait PoolReader: Send + Sync {
    /// `Ok(None)` when the pool id does not exist on chain.
    async fn get_pool(&self, pool_id: U256) -> ContractResult<Option<Pool>>;

    async fn list_active_pool_ids(&self) -> ContractResult<Vec<U256>>;
}

#[async_trait]
pub trait FinalizeGateway: Send + Sync {
    async fn base_fee_per_gas(&self) -> ContractResult<u128>;

    async fn account_balance(&self) -> ContractResult<U256>;

    async fn estimate_finalize_gas(&self, pool_id: U256, price: U256) -> ContractResult<u64>;

    async fn send_finalize(
        &self,
        pool_id: U256,
        price: U256,
        gas_limit: u64,
        fees: FeeBid,
    ) -> ContractResult<TxHash>;
}

/// Contract gateway backed by the signing wallet and the on-chain market.
#[derive(Clone)]
pub struct ChainGateway {
    wallet: Wallet,
    market: PredictionMarketContract<WalletProvider>,
}

impl ChainGateway {
    pub fn new(wallet: Wallet, market: PredictionMarketContract<WalletProvider>) -> Self {
        Self { wallet, market }
    }

    pub fn account(&self) -> Address {
        self.wallet.address()
    }

    pub fn market(&self) -> &PredictionMarketContract<WalletProvider> {
        &self.market
    }

    pub async fn create_pool(
        &self,
        target_price: U256,
        stop_loss: U256,
        duration: U256,
        fees: FeeBid,
    ) -> ContractResult<TxHash> {
        let from = self.account();
        let gas_limit = self
            .market
            .estimate_create_gas(from, target_price, stop_loss, duration)
            .await?;
        let nonce = self.wallet.pending_nonce().await?;
        self.market
            .create_pool(
                from,
                target_price,
                stop_loss,
                duration,
                TxSettings {
                    nonce,
                    gas_limit,
                    max_fee_per_gas: fees.max_fee_per_gas,
                    max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
                },
            )
            .await
    }
}

#[async_trait]
impl PoolReader for ChainGateway {
    async fn get_pool(&self, pool_id: U256) -> ContractResult<Option<Pool>> {
        self.market.get_pool(pool_id).await
    }

    async fn list_active_pool_ids(&self) -> ContractResult<Vec<U256>> {
        self.market.get_active_pool_ids().await
    }
}

#[async_trait]
impl FinalizeGateway for ChainGateway {
    async fn base_fee_per_gas(&self) -> ContractResult<u128> {
        self.wallet.get_gas_price().await
    }

    async fn account_balance(&self) -> ContractResult<U256> {
        self.wallet.get_balance().await
    }

    async fn estimate_finalize_gas(&self, pool_id: U256, price: U256) -> ContractResult<u64> {
        self.market
            .estimate_resolve_gas(self.account(), pool_id, price)
            .await
    }

    async fn send_finalize(
        &self,
        pool_id: U256,
        price: U256,
        gas_limit: u64,
        fees: FeeBid,
    ) -> ContractResult<TxHash> {
        let nonce = self.wallet.pending_nonce().await?;
        self.market
            .resolve_pool(
                self.account(),
                pool_id,
                price,
                TxSettings {
                    nonce,
                    gas_limit,
                    max_fee_per_gas: fees.max_fee_per_gas,
                    max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
                },
            )
            .await
    }
}
