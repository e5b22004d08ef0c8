//! Central Bank of Russia daily rates, via the JSON mirror of the official
//! XML feed.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::core::CurrencyRateProvider;
use crate::providers::util::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, http_client, with_retry};

const CBR_CURRENCY: &str = "RUB";

pub struct CbrCurrencyProvider {
    base_url: String,
}

impl CbrCurrencyProvider {
    pub fn new(base_url: &str) -> Self {
        CbrCurrencyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CbrDailyResponse {
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Valute")]
    valute: HashMap<String, CbrValute>,
}

#[derive(Debug, Deserialize)]
struct CbrValute {
    #[serde(rename = "Nominal")]
    nominal: f64,
    #[serde(rename = "Value")]
    value: f64,
}

#[async_trait]
impl CurrencyRateProvider for CbrCurrencyProvider {
    #[instrument(name = "CbrRateFetch", skip(self))]
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        if !to.eq_ignore_ascii_case(CBR_CURRENCY) {
            bail!("CBR only quotes rates in {CBR_CURRENCY}, not {to}");
        }
        if from.eq_ignore_ascii_case(CBR_CURRENCY) {
            return Ok(1.0);
        }

        let url = format!("{}/daily_json.js", self.base_url);
        debug!("Requesting currency rates from {}", url);

        let client = http_client()?;
        let response = with_retry(
            || client.get(&url).send(),
            DEFAULT_RETRIES,
            DEFAULT_RETRY_DELAY_MS,
        )
        .await
        .and_then(|r| r.error_for_status().map_err(anyhow::Error::from))
        .with_context(|| format!("Failed to fetch CBR rates from {url}"))?;

        let data: CbrDailyResponse = response
            .json()
            .await
            .context("Failed to parse CBR rates response")?;

        let code = from.to_ascii_uppercase();
        let valute = data
            .valute
            .get(&code)
            .ok_or_else(|| anyhow!("No CBR rate found for currency: {}", code))?;
        if valute.nominal <= 0.0 {
            bail!("Invalid CBR nominal for {}: {}", code, valute.nominal);
        }

        let rate = valute.value / valute.nominal;
        debug!(date = ?data.date, rate, "Received CBR rate for {}", code);
        Ok(rate)
    }
}
