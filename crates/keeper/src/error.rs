use alloy::primitives::U256;
use shared::web3::contracts::core::error::ContractError;
use thiserror::Error;

use crate::price::PriceError;

/// Failures of an evaluation pass or a finalize dispatch. Every variant is
/// recoverable: callers log it and retry on their next trigger.
#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("Price unavailable: {0}")]
    PriceUnavailable(#[from] PriceError),

    #[error("Pool {0} not found")]
    PoolNotFound(U256),

    #[error("Pool {0} is already finalized")]
    AlreadyFinalized(U256),

    #[error("Insufficient funds for gas. Required: {required} wei, available: {available} wei")]
    InsufficientFunds { required: U256, available: U256 },

    #[error("Submission failed: {0}")]
    SubmissionFailed(ContractError),

    #[error("Unknown contract state: {0}")]
    UnknownContractState(ContractError),
}

impl KeeperError {
    pub fn kind(&self) -> &'static str {
        match self {
            KeeperError::PriceUnavailable(_) => "price_unavailable",
            KeeperError::PoolNotFound(_) => "pool_not_found",
            KeeperError::AlreadyFinalized(_) => "already_finalized",
            KeeperError::InsufficientFunds { .. } => "insufficient_funds",
            KeeperError::SubmissionFailed(_) => "submission_failed",
            KeeperError::UnknownContractState(_) => "unknown_contract_state",
        }
    }
}
