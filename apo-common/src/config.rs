//! Configuration loading and validation
//!
//! Resolution priority for the config file location:
//! 1. Command-line argument (highest priority)
//! 2. `APO_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/onet-apo/config.toml`)
//!
//! Individual values are then resolved as ENV → TOML → compiled default.
//! A missing config file is not fatal: a warning is logged and defaults are used.
//! Credentials and feature flags are validated once, here, and the resulting
//! [`AppConfig`] is injected into the engine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "APO_CONFIG";

const CONFIG_DIR_NAME: &str = "onet-apo";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub onet: OnetConfig,
    pub serp: SerpConfig,
    pub features: FeatureFlags,
    pub cache: CacheConfig,
    pub engine: EngineTuning,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter directive (overridden by RUST_LOG)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// O*NET Web Services credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OnetConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    /// Minimum spacing between O*NET requests
    pub min_request_interval_ms: u64,
}

impl Default for OnetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://services.onetcenter.org/ws".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
            min_request_interval_ms: 200,
        }
    }
}

impl OnetConfig {
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(is_valid_key)
            && self.password.as_deref().is_some_and(is_valid_key)
    }
}

/// SERP (search engine results) API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SerpConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SerpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://serpapi.com/search.json".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl SerpConfig {
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(is_valid_key)
    }
}

/// Switches for each optional external source
///
/// A disabled source takes the same fallback path as a failing one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct FeatureFlags {
    pub use_onet: bool,
    pub use_serp: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            use_onet: true,
            use_serp: false,
        }
    }
}

/// Cache lifetimes per data class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Computed APO results
    pub apo_ttl_secs: u64,
    /// Fetched historical series
    pub historical_ttl_secs: u64,
    /// Most computed APO results held at once; the oldest is evicted beyond this
    pub apo_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            apo_ttl_secs: 5 * 60,
            historical_ttl_secs: 30 * 60,
            apo_max_entries: 1_000,
        }
    }
}

/// Scoring engine tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineTuning {
    /// Fraction of confidence removed when any input is synthetic (0.0-1.0)
    pub mock_confidence_discount: f64,
    /// Forecast horizon used when the request does not specify one
    pub forecast_months: u32,
    /// Time-based adjustment horizon used when the request does not specify one
    pub default_timeframe_years: f64,
    /// Length of the historical window requested from sources
    pub history_months: u32,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            mock_confidence_discount: 0.30,
            forecast_months: 6,
            default_timeframe_years: 2.0,
            history_months: 12,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ONET_USERNAME") {
            self.onet.username = Some(v);
        }
        if let Some(v) = lookup("ONET_PASSWORD") {
            self.onet.password = Some(v);
        }
        if let Some(v) = lookup("ONET_API_URL") {
            self.onet.base_url = v;
        }
        if let Some(v) = lookup("SERP_API_KEY") {
            self.serp.api_key = Some(v);
        }
        if let Some(v) = lookup("SERP_API_URL") {
            self.serp.base_url = v;
        }
        if let Some(flag) = lookup("APO_USE_ONET").as_deref().and_then(parse_flag) {
            self.features.use_onet = flag;
        }
        if let Some(flag) = lookup("APO_USE_SERP").as_deref().and_then(parse_flag) {
            self.features.use_serp = flag;
        }
        if let Some(port) = lookup("APO_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(level) = lookup("APO_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate ranges and reconcile feature flags with available credentials
    ///
    /// A source enabled without credentials is switched off (mock fallback) rather
    /// than failing startup.
    pub fn validate(&mut self) -> Result<()> {
        let discount = self.engine.mock_confidence_discount;
        if !(0.0..1.0).contains(&discount) {
            return Err(Error::Config(format!(
                "engine.mock_confidence_discount must be in [0, 1), got {}",
                discount
            )));
        }
        if self.engine.forecast_months == 0 || self.engine.forecast_months > 120 {
            return Err(Error::Config(format!(
                "engine.forecast_months must be in 1..=120, got {}",
                self.engine.forecast_months
            )));
        }
        if !self.engine.default_timeframe_years.is_finite()
            || self.engine.default_timeframe_years < 0.0
        {
            return Err(Error::Config(
                "engine.default_timeframe_years must be a non-negative number".to_string(),
            ));
        }
        if self.engine.history_months == 0 {
            return Err(Error::Config("engine.history_months must be positive".to_string()));
        }
        if self.cache.apo_ttl_secs == 0 || self.cache.historical_ttl_secs == 0 {
            return Err(Error::Config("cache TTLs must be positive".to_string()));
        }
        if self.cache.apo_max_entries == 0 {
            return Err(Error::Config("cache.apo_max_entries must be positive".to_string()));
        }

        if self.features.use_onet && !self.onet.has_credentials() {
            warn!("O*NET enabled but ONET_USERNAME/ONET_PASSWORD missing; using synthetic occupation data");
            self.features.use_onet = false;
        }
        if self.features.use_serp && !self.serp.has_credentials() {
            warn!("SERP enabled but SERP_API_KEY missing; using synthetic research data");
            self.features.use_serp = false;
        }

        Ok(())
    }
}

/// Resolves the config file location and produces a validated [`AppConfig`]
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Config file path by priority: CLI → ENV → platform default
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        default_config_path()
    }

    /// Load, override and validate
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = match self.config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                AppConfig::load_file(&path)?
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                AppConfig::default()
            }
            None => {
                warn!("No config directory available, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Platform default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Validate credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
