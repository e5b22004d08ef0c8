use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::{CurrencyRateProvider, PriceProvider, PriceResult};

// Workbooks often share product codes; only successful lookups are kept so a
// failed one is retried for the next workbook.
#[derive(Clone)]
pub struct CachingPriceProvider<T: PriceProvider> {
    inner: T,
    cache: Arc<Mutex<HashMap<String, PriceResult>>>,
}

impl<T: PriceProvider> CachingPriceProvider<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl<T: PriceProvider> PriceProvider for CachingPriceProvider<T> {
    async fn fetch_price(&self, code: &str) -> Result<PriceResult> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.get(code) {
            debug!("Cache hit for price: {}", code);
            return Ok(cached.clone());
        }
        debug!("Cache miss for price: {}", code);
        let result = self.inner.fetch_price(code).await?;
        cache.insert(code.to_string(), result.clone());
        Ok(result)
    }
}

#[derive(Clone)]
pub struct CachingCurrencyRateProvider<T: CurrencyRateProvider> {
    inner: T,
    cache: Arc<Mutex<HashMap<String, f64>>>,
}

impl<T: CurrencyRateProvider> CachingCurrencyRateProvider<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl<T: CurrencyRateProvider> CurrencyRateProvider for CachingCurrencyRateProvider<T> {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let key = format!("{}-{}", from.to_uppercase(), to.to_uppercase());
        let mut cache = self.cache.lock().await;
        if let Some(rate) = cache.get(&key) {
            debug!("Cache hit for currency rate: {}", key);
            return Ok(*rate);
        }
        debug!("Cache miss for currency rate: {}", key);
        let rate = self.inner.get_rate(from, to).await?;
        cache.insert(key, rate);
        Ok(rate)
    }
}
