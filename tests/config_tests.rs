use pair_analytics::analytics::regression::RegressionKind;
use pair_analytics::analytics::resample::ResampleRule;
use pair_analytics::config::{parse_interval_ms, BinanceConfig, Config};

#[test]
fn parse_full_toml() {
    let toml_str = r#"
[binance]
ws_base_url = "wss://stream.binance.com:9443"
symbols = ["BTCUSDT", "ETHUSDT", "BNBUSDT"]

[store]
path = "data/ticks.db"

[analytics]
resample_rule = "5min"
rolling_window = 60
lookback_minutes = 120
regression = "ols"
alert_z = 2.5

[logging]
level = "debug"
"#;
    let config = Config::from_toml_str(toml_str).unwrap();
    assert_eq!(config.binance.symbols.len(), 3);
    assert_eq!(config.store.path, "data/ticks.db");
    assert_eq!(config.analytics.resample_rule, ResampleRule::FiveMinutes);
    assert_eq!(config.analytics.rolling_window, 60);
    assert_eq!(config.analytics.lookback_minutes, 120);
    assert_eq!(config.analytics.regression, RegressionKind::Ols);
    assert!((config.analytics.alert_z - 2.5).abs() < f64::EPSILON);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn optional_sections_fall_back_to_defaults() {
    let config = Config::from_toml_str("[binance]\nsymbols = [\"btcusdt\"]\n").unwrap();
    assert_eq!(config.binance.ws_base_url, "wss://stream.binance.com:9443");
    assert_eq!(config.store.path, "ticks.db");
    assert_eq!(config.analytics.resample_rule, ResampleRule::OneSecond);
    assert_eq!(config.analytics.rolling_window, 20);
    assert_eq!(config.analytics.lookback_minutes, 30);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn invalid_values_are_rejected() {
    assert!(Config::from_toml_str("[binance]\nsymbols = []\n").is_err());
    assert!(Config::from_toml_str("[binance]\nsymbols = [\"  \"]\n").is_err());
    assert!(Config::from_toml_str(
        "[binance]\nsymbols = [\"BTCUSDT\"]\n[analytics]\nrolling_window = 1\n"
    )
    .is_err());
    assert!(Config::from_toml_str(
        "[binance]\nsymbols = [\"BTCUSDT\"]\n[analytics]\nresample_rule = \"7s\"\n"
    )
    .is_err());
    assert!(Config::from_toml_str(
        "[binance]\nsymbols = [\"BTCUSDT\"]\n[analytics]\nregression = \"kalman\"\n"
    )
    .is_err());
}

#[test]
fn tradable_symbols_normalise_and_dedup() {
    let cfg = BinanceConfig {
        ws_base_url: "wss://x".to_string(),
        symbols: vec![
            " btcusdt ".to_string(),
            "ETHUSDT".to_string(),
            "BTCUSDT".to_string(),
            "".to_string(),
        ],
    };
    assert_eq!(
        cfg.tradable_symbols(),
        vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
    );
}

#[test]
fn parse_interval_valid() {
    assert_eq!(parse_interval_ms("1s").unwrap(), 1_000);
    assert_eq!(parse_interval_ms("1min").unwrap(), 60_000);
    assert_eq!(parse_interval_ms("1d").unwrap(), 86_400_000);
}

#[test]
fn shipped_default_config_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let config = Config::load_from(&path).unwrap();
    assert!(!config.binance.tradable_symbols().is_empty());
}
