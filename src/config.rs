use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::analytics::regression::RegressionKind;
use crate::analytics::resample::ResampleRule;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub binance: BinanceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_resample_rule")]
    pub resample_rule: ResampleRule,
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: u64,
    #[serde(default)]
    pub regression: RegressionKind,
    #[serde(default = "default_alert_z")]
    pub alert_z: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            resample_rule: default_resample_rule(),
            rolling_window: default_rolling_window(),
            lookback_minutes: default_lookback_minutes(),
            regression: RegressionKind::default(),
            alert_z: default_alert_z(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_ws_base_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_store_path() -> String {
    "ticks.db".to_string()
}

fn default_resample_rule() -> ResampleRule {
    ResampleRule::OneSecond
}

fn default_rolling_window() -> usize {
    20
}

fn default_lookback_minutes() -> u64 {
    30
}

fn default_alert_z() -> f64 {
    2.0
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse an interval string (e.g. "1s", "5min", "1m", "1h") into milliseconds.
/// `m` and `min` both mean minutes.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    let s = s.trim();
    let split_at = s
        .find(|c: char| !c.is_ascii_digit())
        .with_context(|| format!("invalid interval '{}': missing unit suffix", s))?;
    if split_at == 0 {
        bail!("invalid interval '{}': expected format like '1s' or '5min'", s);
    }

    let (num_str, suffix) = s.split_at(split_at);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" | "min" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/min/h/d",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl BinanceConfig {
    /// Symbols trimmed, upper-cased and de-duplicated, first occurrence wins.
    pub fn tradable_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("PAIR_ANALYTICS_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(Path::new(&config_path))?;

        if let Ok(path) = std::env::var("PAIR_ANALYTICS_DB") {
            if !path.trim().is_empty() {
                config.store.path = path;
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.binance.tradable_symbols().is_empty() {
            bail!("binance.symbols must list at least one symbol");
        }
        if self.analytics.rolling_window < 2 {
            bail!(
                "analytics.rolling_window must be >= 2, got {}",
                self.analytics.rolling_window
            );
        }
        if !self.analytics.alert_z.is_finite() || self.analytics.alert_z <= 0.0 {
            bail!("analytics.alert_z must be a positive number");
        }
        Ok(())
    }
}
