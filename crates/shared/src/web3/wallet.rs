use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::{
    network::EthereumWallet,
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use url::Url;

use crate::web3::contracts::core::error::{ContractError, ContractResult};

/// Provider with gas, nonce and chain id fillers plus the signing wallet.
pub type WalletProvider = DynProvider;

#[derive(Clone)]
pub struct Wallet {
    pub wallet: EthereumWallet,
    pub signer: PrivateKeySigner,
    pub provider: WalletProvider,
}

impl Wallet {
    pub fn new(private_key: &str, provider_url: Url) -> ContractResult<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| ContractError::Web3Error(format!("invalid private key: {e}")))?;
        let signer_clone = signer.clone();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new()
            .wallet(wallet.clone())
            .connect_http(provider_url)
            .erased();

        Ok(Self {
            wallet,
            signer: signer_clone,
            provider,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn provider(&self) -> WalletProvider {
        self.provider.clone()
    }

    pub async fn get_balance(&self) -> ContractResult<U256> {
        let balance = self
            .provider
            .get_balance(self.address())
            .await
            .map_err(|e| ContractError::CallError(format!("balance lookup failed: {e}")))?;

        Ok(balance)
    }

    /// Next nonce including transactions still sitting in the mempool.
    pub async fn pending_nonce(&self) -> ContractResult<u64> {
        let address = self.address();
        let latest_nonce = self
            .provider
            .get_transaction_count(address)
            .await
            .map_err(|e| ContractError::CallError(format!("nonce lookup failed: {e}")))?;
        let pending_nonce = self
            .provider
            .get_transaction_count(address)
            .block_id(BlockId::Number(BlockNumberOrTag::Pending))
            .await
            .map_err(|e| ContractError::CallError(format!("nonce lookup failed: {e}")))?;

        if pending_nonce > latest_nonce {
            log::info!(
                "Pending transactions detected - Pending nonce {pending_nonce} vs next accepted nonce {latest_nonce}"
            );
        }

        Ok(pending_nonce)
    }

    pub async fn get_gas_price(&self) -> ContractResult<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ContractError::CallError(format!("gas price lookup failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well known anvil development key #0.
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_wallet_address_from_key() {
        let wallet = Wallet::new(DEV_KEY, Url::parse("http://localhost:8545").unwrap()).unwrap();
        assert_eq!(
            wallet.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected() {
        let result = Wallet::new("not-a-key", Url::parse("http://localhost:8545").unwrap());
        assert!(matches!(result, Err(ContractError::Web3Error(_))));
    }
}
