pub mod coingecko;

use alloy::primitives::utils::{parse_units, ParseUnits};
use alloy::primitives::U256;
use async_trait::async_trait;
use thiserror::Error;

pub use coingecko::CoinGeckoPriceSource;

/// Decimals of every fixed-point price handled by the keeper.
pub const PRICE_DECIMALS: u8 = 18;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Price API returned status {0}")]
    Status(u16),

    #[error("No {currency} price for asset {asset}")]
    MissingAsset { asset: String, currency: String },

    #[error("Invalid price {0}")]
    InvalidPrice(String),
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current asset price in 18-decimal fixed point.
    async fn current_price(&self) -> Result<U256, PriceError>;
}

/// Converts a decimal string such as `"67012.5"` into fixed point without
/// passing through float multiplication.
pub fn to_fixed_point(value: &str) -> Result<U256, PriceError> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('-') {
        return Err(PriceError::InvalidPrice(value.to_string()));
    }
    match parse_units(value, PRICE_DECIMALS) {
        Ok(ParseUnits::U256(amount)) => Ok(amount),
        Ok(ParseUnits::I256(_)) | Err(_) => Err(PriceError::InvalidPrice(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u64).pow(U256::from(18))
    }

    #[test]
    fn test_whole_number() {
        assert_eq!(to_fixed_point("3000").unwrap(), wei(3000));
    }

    #[test]
    fn test_fractional_number_is_exact() {
        let expected = wei(67012) + U256::from(120_000_000_000_000_000u64);
        assert_eq!(to_fixed_point("67012.12").unwrap(), expected);
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert!(to_fixed_point("-1").is_err());
        assert!(to_fixed_point("").is_err());
        assert!(to_fixed_point("abc").is_err());
    }
}
