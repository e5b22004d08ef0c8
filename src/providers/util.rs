use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Retries an async request with a fixed delay between attempts
///
/// Only transport failures are retried. A response with an error status is
/// handed back as is, for the caller to check.
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt > retries => return Err(err.into()),
            Err(err) => {
                debug!("Attempt {}/{} failed: {}. Retrying...", attempt, retries, err);
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Shared HTTP client setup for all providers.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("pricebook/", env!("CARGO_PKG_VERSION")))
        .build()
}
