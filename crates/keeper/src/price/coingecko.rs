use alloy::primitives::U256;
use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::Value;
use std::time::Duration;

use super::{to_fixed_point, PriceError, PriceSource, PRICE_DECIMALS};

pub const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CoinGeckoPriceSource {
    client: reqwest::Client,
    base_url: String,
    asset_id: String,
    vs_currency: String,
}

impl CoinGeckoPriceSource {
    pub fn new(base_url: &str, asset_id: &str, vs_currency: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            asset_id: asset_id.to_string(),
            vs_currency: vs_currency.to_string(),
        }
    }

    async fn fetch(&self) -> Result<U256, PriceError> {
        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("ids", self.asset_id.as_str()),
                ("vs_currencies", self.vs_currency.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        debug!("Price API response: {body}");

        let quote = body
            .get(&self.asset_id)
            .and_then(|asset| asset.get(&self.vs_currency))
            .ok_or_else(|| PriceError::MissingAsset {
                asset: self.asset_id.clone(),
                currency: self.vs_currency.clone(),
            })?;

        parse_quote(quote)
    }
}

/// JSON numbers are rendered back to their shortest decimal form so the
/// fixed-point conversion sees exactly the digits the API sent.
fn parse_quote(quote: &Value) -> Result<U256, PriceError> {
    let Value::Number(number) = quote else {
        return Err(PriceError::InvalidPrice(quote.to_string()));
    };

    let rendered = number.to_string();
    if rendered.contains(['e', 'E']) {
        let float = number
            .as_f64()
            .ok_or_else(|| PriceError::InvalidPrice(rendered.clone()))?;
        return to_fixed_point(&format!("{:.*}", PRICE_DECIMALS as usize, float));
    }
    to_fixed_point(&rendered)
}

#[async_trait]
impl PriceSource for CoinGeckoPriceSource {
    async fn current_price(&self) -> Result<U256, PriceError> {
        match self.fetch().await {
            Ok(price) => {
                info!(
                    "Fetched current {} price: {}",
                    self.asset_id,
                    alloy::primitives::utils::format_ether(price)
                );
                Ok(price)
            }
            Err(e) => {
                error!("Error fetching price: {e}");
                Err(e)
            }
        }
    }
}
