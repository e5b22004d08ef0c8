pub mod cli;
pub mod core;
pub mod providers;
pub mod updater;
pub mod workbook;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::config::{AppConfig, ConfigOverrides};
use crate::core::{CurrencyRateProvider, PriceProvider};
use crate::providers::caching::{CachingCurrencyRateProvider, CachingPriceProvider};
use crate::providers::cbr::CbrCurrencyProvider;
use crate::providers::market::MarketPriceProvider;
use crate::updater::UpdateContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookStatus {
    Updated,
    UpToDate,
    /// A row was due but the workbook was not saved
    DryRun,
    Skipped(String),
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookStatus::Updated => write!(f, "updated"),
            BookStatus::UpToDate => write!(f, "up to date"),
            BookStatus::DryRun => write!(f, "dry run"),
            BookStatus::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookOutcome {
    pub path: PathBuf,
    pub last_update: Option<NaiveDateTime>,
    pub hours_since: Option<i64>,
    pub rows_updated: u32,
    pub status: BookStatus,
}

impl BookOutcome {
    fn skipped(path: &Path, reason: String) -> Self {
        BookOutcome {
            path: path.to_path_buf(),
            last_update: None,
            hours_since: None,
            rows_updated: 0,
            status: BookStatus::Skipped(reason),
        }
    }
}

/// Loads the config, wires up the network providers and refreshes every
/// workbook in the sheets directory.
pub async fn run(config_path: Option<&str>, overrides: ConfigOverrides) -> Result<Vec<BookOutcome>> {
    info!("Price book updater starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    }
    .apply_overrides(overrides);
    debug!("Loaded config: {config:#?}");

    let ctx = UpdateContext {
        now: updater::date::now_utc(),
        interval_hours: config.update_interval_hours,
        usd_column: config.usd_column_index()?,
        currency: config.currency.clone(),
        base_currency: config.base_currency.clone(),
    };

    let price_provider = CachingPriceProvider::new(MarketPriceProvider::new(
        config.market_base_url(),
        config.market_api_key(),
    ));
    let currency_provider =
        CachingCurrencyRateProvider::new(CbrCurrencyProvider::new(config.cbr_base_url()));

    process_books(
        &config.sheets_dir(),
        &ctx,
        &price_provider,
        &currency_provider,
        config.dry_run,
    )
    .await
}

/// Refreshes the workbooks in `dir` one after another.
///
/// A workbook that cannot be read or updated is logged and skipped; a failure
/// to write one back aborts the run.
pub async fn process_books(
    dir: &Path,
    ctx: &UpdateContext,
    prices: &dyn PriceProvider,
    rates: &dyn CurrencyRateProvider,
    dry_run: bool,
) -> Result<Vec<BookOutcome>> {
    let paths = workbook::discover(dir)?;
    if paths.is_empty() {
        warn!("No workbooks found in {}", dir.display());
    }

    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        let mut book = match workbook::read(&path) {
            Ok(book) => book,
            Err(e) => {
                warn!("Error: {e:#}");
                outcomes.push(BookOutcome::skipped(&path, e.to_string()));
                continue;
            }
        };

        let update = match updater::update_book(&mut book, ctx, prices, rates).await {
            Ok(update) => update,
            Err(e) => {
                warn!("Skipping {}: {e:#}", path.display());
                outcomes.push(BookOutcome::skipped(&path, format!("{e:#}")));
                continue;
            }
        };

        let status = if update.rows_updated > 0 {
            info!("Updated rows: {} in {}", update.rows_updated, path.display());
            let saved = workbook::save(&book, &path, dry_run)
                .with_context(|| format!("Failed to save {}", path.display()))?;
            if saved {
                BookStatus::Updated
            } else {
                BookStatus::DryRun
            }
        } else {
            info!("{} is up to date", path.display());
            BookStatus::UpToDate
        };

        outcomes.push(BookOutcome {
            path,
            last_update: update.staleness.last_update,
            hours_since: update.staleness.hours_since,
            rows_updated: update.rows_updated,
            status,
        });
    }

    Ok(outcomes)
}
