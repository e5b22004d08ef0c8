//! Currency rate abstractions

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    /// Units of `to` for one unit of `from`.
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64>;
}
