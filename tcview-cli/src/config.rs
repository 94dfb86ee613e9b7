//! Runtime configuration loaded from `tornado-viewer.toml`.
//!
//! Every setting has a built-in default, so the file is optional. Only the
//! explorer connection can be tuned:
//!
//! ```toml
//! [explorer]
//! base_url = "https://api.etherscan.io/v2/api"
//! chain_id = 1
//! request_timeout_secs = 30
//! validation_timeout_secs = 15
//! page_delay_ms = 200
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tcview::ExplorerConfig;
use tcview::explorer::{
    DEFAULT_BASE_URL, MAINNET_CHAIN_ID, PAGE_DELAY, REQUEST_TIMEOUT, VALIDATION_TIMEOUT,
};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tornado-viewer.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Explorer connection settings.
    #[serde(default)]
    pub explorer: ExplorerSettings,
}

/// `[explorer]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplorerSettings {
    /// API endpoint.
    pub base_url: String,
    /// Chain id sent with every request.
    pub chain_id: u64,
    /// Timeout for listing and block lookups.
    pub request_timeout_secs: u64,
    /// Timeout for API-key validation.
    pub validation_timeout_secs: u64,
    /// Pause between result pages.
    pub page_delay_ms: u64,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            chain_id: MAINNET_CHAIN_ID,
            request_timeout_secs: REQUEST_TIMEOUT.as_secs(),
            validation_timeout_secs: VALIDATION_TIMEOUT.as_secs(),
            page_delay_ms: u64::try_from(PAGE_DELAY.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl ExplorerSettings {
    /// Client settings for `api_key`.
    #[must_use]
    pub fn client_config(&self, api_key: &str) -> ExplorerConfig {
        ExplorerConfig {
            base_url: self.base_url.clone(),
            chain_id: self.chain_id,
            api_key: api_key.to_owned(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            validation_timeout: Duration::from_secs(self.validation_timeout_secs),
            page_delay: Duration::from_millis(self.page_delay_ms),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns [`Config::default`] if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}
