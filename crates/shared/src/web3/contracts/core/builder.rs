use alloy::primitives::Address;
use alloy::providers::Provider;

use crate::web3::contracts::{
    core::error::ContractError,
    implementations::prediction_market_contract::PredictionMarketContract,
};

#[derive(Clone)]
pub struct Contracts<P: Provider + Clone> {
    pub prediction_market: PredictionMarketContract<P>,
}

pub struct ContractBuilder<P: Provider + Clone> {
    provider: P,
    prediction_market: Option<PredictionMarketContract<P>>,
}

impl<P: Provider + Clone> ContractBuilder<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            prediction_market: None,
        }
    }

    pub fn with_prediction_market(mut self, address: Address) -> Self {
        self.prediction_market = Some(PredictionMarketContract::new(
            address,
            self.provider.clone(),
        ));
        self
    }

    pub fn build(self) -> Result<Contracts<P>, ContractError> {
        let prediction_market = match self.prediction_market {
            Some(contract) if contract.address() != Address::ZERO => contract,
            Some(_) => {
                return Err(ContractError::Web3Error(
                    "PredictionMarket address must not be zero".into(),
                ))
            }
            None => {
                return Err(ContractError::Web3Error(
                    "PredictionMarket not initialized".into(),
                ))
            }
        };

        Ok(Contracts { prediction_market })
    }
}
