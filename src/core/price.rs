//! Product pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;

/// A product listed on the "Products" sheet. Identity is `code`.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    pub code: String,
    pub price_avg: f64,
}

impl Product {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Product {
            name: name.into(),
            code: code.into(),
            price_avg: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceResult {
    pub price_avg: f64,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub name: Option<String>,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self, code: &str) -> Result<PriceResult>;
}
