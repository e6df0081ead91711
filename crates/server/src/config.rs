use log::{info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::RetryPolicy;
use crate::coordinator::CycleSettings;
use crate::error::ConfigError;
use shared::Asset;

pub const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const DEFAULT_ASSETS: &str = "bitcoin,ethereum,solana";
pub const DEFAULT_CURRENCIES: &str = "usd";
pub const DEFAULT_CHART_PATH: &str = "static/images/crypto_prices.svg";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api_url: String,
    pub assets: Vec<String>,
    pub currencies: Vec<String>,
    pub sample_count: usize,
    pub sample_interval_seconds: u64,
    pub update_interval_seconds: u64,
    pub degraded_threshold: u32,
    pub max_retry_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_jitter: bool,
    pub rate_limit_wait_seconds: u64,
    pub request_timeout_seconds: u64,
    pub chart_path: PathBuf,
    pub http_host: String,
    pub http_port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            api_url: DEFAULT_API_URL.to_string(),
            assets: split_list(DEFAULT_ASSETS),
            currencies: split_list(DEFAULT_CURRENCIES),
            sample_count: 5,
            sample_interval_seconds: 2,
            update_interval_seconds: 300,
            degraded_threshold: 3,
            max_retry_attempts: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
            backoff_jitter: false,
            rate_limit_wait_seconds: 60,
            request_timeout_seconds: 10,
            chart_path: PathBuf::from(DEFAULT_CHART_PATH),
            http_host: "0.0.0.0".to_string(),
            http_port: 5000,
            log_level: "INFO".to_string(),
        }
    }
}

/// Optional TOML layer; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub assets: Option<Vec<String>>,
    pub currencies: Option<Vec<String>>,
    pub sample_count: Option<usize>,
    pub sample_interval_seconds: Option<u64>,
    pub update_interval_seconds: Option<u64>,
    pub degraded_threshold: Option<u32>,
    pub max_retry_attempts: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_max_ms: Option<u64>,
    pub backoff_jitter: Option<bool>,
    pub rate_limit_wait_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    pub chart_path: Option<PathBuf>,
    pub http_host: Option<String>,
    pub http_port: Option<u16>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn from_toml(path: &str, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        match dotenv::dotenv() {
            Ok(path) => println!("Loaded environment from: {}", path.display()),
            Err(_) => println!("No .env file found, using process environment"),
        }

        let file = match std::env::var("DASHBOARD_CONFIG") {
            Ok(path) => {
                let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                println!("Loaded config file: {}", path);
                FileConfig::from_toml(&path, &content)?
            }
            Err(_) => FileConfig::default(),
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Layers defaults, then the file, then environment lookups, then validates.
    pub fn from_sources<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        let config = ServerConfig {
            api_url: env("PRICE_API_URL")
                .or(file.api_url)
                .unwrap_or(defaults.api_url),
            assets: env("ASSETS")
                .map(|s| split_list(&s))
                .or(file.assets)
                .unwrap_or(defaults.assets),
            currencies: env("CURRENCIES")
                .map(|s| split_list(&s))
                .or(file.currencies)
                .unwrap_or(defaults.currencies),
            sample_count: parse_var(&env, "SAMPLE_COUNT", file.sample_count.unwrap_or(defaults.sample_count)),
            sample_interval_seconds: parse_var(
                &env,
                "SAMPLE_INTERVAL_SECONDS",
                file.sample_interval_seconds.unwrap_or(defaults.sample_interval_seconds),
            ),
            update_interval_seconds: parse_var(
                &env,
                "UPDATE_INTERVAL_SECONDS",
                file.update_interval_seconds.unwrap_or(defaults.update_interval_seconds),
            ),
            degraded_threshold: parse_var(
                &env,
                "DEGRADED_THRESHOLD",
                file.degraded_threshold.unwrap_or(defaults.degraded_threshold),
            ),
            max_retry_attempts: parse_var(
                &env,
                "MAX_RETRY_ATTEMPTS",
                file.max_retry_attempts.unwrap_or(defaults.max_retry_attempts),
            ),
            backoff_base_ms: parse_var(&env, "BACKOFF_BASE_MS", file.backoff_base_ms.unwrap_or(defaults.backoff_base_ms)),
            backoff_max_ms: parse_var(&env, "BACKOFF_MAX_MS", file.backoff_max_ms.unwrap_or(defaults.backoff_max_ms)),
            backoff_jitter: parse_var(&env, "BACKOFF_JITTER", file.backoff_jitter.unwrap_or(defaults.backoff_jitter)),
            rate_limit_wait_seconds: parse_var(
                &env,
                "RATE_LIMIT_WAIT_SECONDS",
                file.rate_limit_wait_seconds.unwrap_or(defaults.rate_limit_wait_seconds),
            ),
            request_timeout_seconds: parse_var(
                &env,
                "REQUEST_TIMEOUT_SECONDS",
                file.request_timeout_seconds.unwrap_or(defaults.request_timeout_seconds),
            ),
            chart_path: env("CHART_PATH")
                .map(PathBuf::from)
                .or(file.chart_path)
                .unwrap_or(defaults.chart_path),
            http_host: env("HTTP_HOST")
                .or(file.http_host)
                .unwrap_or(defaults.http_host),
            http_port: parse_var(&env, "HTTP_PORT", file.http_port.unwrap_or(defaults.http_port)),
            log_level: env("LOG_LEVEL")
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.assets.is_empty() {
            return Err(ConfigError::Invalid("asset list is empty".to_string()));
        }
        if self.currencies.is_empty() {
            return Err(ConfigError::Invalid("currency list is empty".to_string()));
        }
        if self.update_interval_seconds == 0 {
            return Err(ConfigError::Invalid("refresh interval must be at least 1 second".to_string()));
        }
        if self.max_retry_attempts == 0 {
            return Err(ConfigError::Invalid("max retry attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn setup_logging(&self) {
        shared::init_logging(&self.log_level);
        info!(
            "Tracking {} in {} every {}s",
            self.assets.join(","),
            self.currencies.join(","),
            self.update_interval_seconds
        );
    }

    pub fn tracked_assets(&self) -> Vec<Asset> {
        self.assets.iter().map(|id| Asset::from_id(id)).collect()
    }

    /// The snapshot is quoted in the first configured currency.
    pub fn quote_currency(&self) -> &str {
        self.currencies.first().map(String::as_str).unwrap_or(DEFAULT_CURRENCIES)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            jitter: self.backoff_jitter,
            default_rate_limit_wait: Duration::from_secs(self.rate_limit_wait_seconds),
            ..RetryPolicy::default()
        }
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            sample_count: self.sample_count,
            sample_interval: Duration::from_secs(self.sample_interval_seconds),
            degraded_threshold: self.degraded_threshold,
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<T, F>(env: &F, key: &str, fallback: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{}={:?} is not valid, using {}", key, raw, fallback);
            fallback
        }),
        None => fallback,
    }
}
