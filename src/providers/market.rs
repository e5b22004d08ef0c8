use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::{PriceProvider, PriceResult};
use crate::providers::util::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, http_client, with_retry};

/// Average offer prices from the market content API model endpoint.
pub struct MarketPriceProvider {
    base_url: String,
    api_key: Option<String>,
}

impl MarketPriceProvider {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        MarketPriceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    model: Model,
}

#[derive(Debug, Deserialize)]
struct Model {
    name: Option<String>,
    price: Option<ModelPrice>,
}

#[derive(Debug, Deserialize)]
struct ModelPrice {
    avg: Option<Amount>,
    min: Option<Amount>,
    max: Option<Amount>,
}

/// The API sends prices as strings; numbers are accepted as well.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    fn value(&self) -> Option<f64> {
        match self {
            Amount::Number(n) => Some(*n),
            Amount::Text(s) => s.trim().replace(',', ".").parse().ok(),
        }
    }
}

#[async_trait]
impl PriceProvider for MarketPriceProvider {
    #[instrument(name = "MarketPriceFetch", skip(self), fields(code = %code))]
    async fn fetch_price(&self, code: &str) -> Result<PriceResult> {
        let url = format!("{}/v2/models/{}", self.base_url, code);
        debug!("Requesting price data from {}", url);

        let client = http_client()?;
        let response = with_retry(
            || {
                let mut request = client.get(&url).header("Accept", "application/json");
                if let Some(key) = &self.api_key {
                    request = request.header("Authorization", key);
                }
                request.send()
            },
            DEFAULT_RETRIES,
            DEFAULT_RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Failed to send request for product code: {code}"))?
        .error_for_status()
        .with_context(|| format!("Price lookup failed for product code: {code}"))?;

        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for product code: {code}"))?;

        if response_text.trim().is_empty() {
            return Err(anyhow!("Received empty response for product code: {}", code));
        }

        let data: ModelResponse = serde_json::from_str(&response_text).with_context(|| {
            format!("Failed to parse market response for product code: {code}. Response: '{response_text}'")
        })?;

        let price = data
            .model
            .price
            .ok_or_else(|| anyhow!("No price data found for product code: {}", code))?;
        let price_avg = price
            .avg
            .as_ref()
            .and_then(Amount::value)
            .ok_or_else(|| anyhow!("No average price found for product code: {}", code))?;

        debug!("Successfully fetched average price for {}: {}", code, price_avg);

        Ok(PriceResult {
            price_avg,
            price_min: price.min.as_ref().and_then(Amount::value),
            price_max: price.max.as_ref().and_then(Amount::value),
            name: data.model.name,
        })
    }
}
