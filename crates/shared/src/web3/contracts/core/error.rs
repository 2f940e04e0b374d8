use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Contract call failed: {0}")]
    CallError(String),

    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    #[error("Gas estimation failed: {0}")]
    GasEstimationError(String),

    #[error("Nonce conflict: {0}")]
    NonceConflict(String),

    #[error("Transaction failed: {0}")]
    TransactionError(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Web3 error: {0}")]
    Web3Error(String),
}

pub type ContractResult<T> = Result<T, ContractError>;

impl ContractError {
    /// Classifies a node rejection of a raw transaction. Nodes only report
    /// nonce problems through the error text.
    pub fn from_send_error(err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("nonce too low")
            || lowered.contains("replacement transaction underpriced")
            || lowered.contains("already known")
        {
            ContractError::NonceConflict(message)
        } else {
            ContractError::TransactionError(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_classification() {
        assert!(matches!(
            ContractError::from_send_error("server returned an error response: nonce too low: next nonce 5, tx nonce 4"),
            ContractError::NonceConflict(_)
        ));
        assert!(matches!(
            ContractError::from_send_error("Replacement transaction underpriced"),
            ContractError::NonceConflict(_)
        ));
        assert!(matches!(
            ContractError::from_send_error("execution reverted: Pool already finalized"),
            ContractError::TransactionError(_)
        ));
    }
}
