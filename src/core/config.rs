use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::updater::column::column_index;

pub const DEFAULT_CBR_URL: &str = "https://www.cbr-xml-daily.ru";
pub const DEFAULT_MARKET_URL: &str = "https://api.content.market.yandex.ru";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CbrProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub cbr: Option<CbrProviderConfig>,
    pub market: Option<MarketProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            cbr: Some(CbrProviderConfig {
                base_url: DEFAULT_CBR_URL.to_string(),
            }),
            market: Some(MarketProviderConfig {
                base_url: DEFAULT_MARKET_URL.to_string(),
                api_key: None,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_sheets_path")]
    pub sheets_path: String,
    #[serde(default = "default_usd_column")]
    pub usd_column: String,
    /// Minimum hours between two price rows
    #[serde(default = "default_update_interval")]
    pub update_interval_hours: u32,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

fn default_sheets_path() -> String {
    "./sheets".to_string()
}

fn default_usd_column() -> String {
    "M".to_string()
}

fn default_update_interval() -> u32 {
    6
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_base_currency() -> String {
    "RUB".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            sheets_path: default_sheets_path(),
            usd_column: default_usd_column(),
            update_interval_hours: default_update_interval(),
            dry_run: false,
            currency: default_currency(),
            base_currency: default_base_currency(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub sheets_path: Option<String>,
    pub usd_column: Option<String>,
    pub update_interval_hours: Option<u32>,
    pub dry_run: bool,
}

impl AppConfig {
    /// Loads the config from the default location, falling back to defaults
    /// when no file has been set up yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "pricebook", "pricebook")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(path) = overrides.sheets_path {
            self.sheets_path = path;
        }
        if let Some(column) = overrides.usd_column {
            self.usd_column = column;
        }
        if let Some(hours) = overrides.update_interval_hours {
            self.update_interval_hours = hours;
        }
        self.dry_run |= overrides.dry_run;
        self
    }

    /// 1-based column index of the configured USD column.
    pub fn usd_column_index(&self) -> Result<u32> {
        column_index(&self.usd_column)
            .with_context(|| format!("Invalid usd_column in config: '{}'", self.usd_column))
    }

    pub fn sheets_dir(&self) -> PathBuf {
        PathBuf::from(&self.sheets_path)
    }

    pub fn cbr_base_url(&self) -> &str {
        self.providers
            .cbr
            .as_ref()
            .map_or(DEFAULT_CBR_URL, |p| &p.base_url)
    }

    pub fn market_base_url(&self) -> &str {
        self.providers
            .market
            .as_ref()
            .map_or(DEFAULT_MARKET_URL, |p| &p.base_url)
    }

    pub fn market_api_key(&self) -> Option<&str> {
        self.providers
            .market
            .as_ref()
            .and_then(|p| p.api_key.as_deref())
    }
}
