use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::config::parse_interval_ms;
use crate::error::AppError;
use crate::model::candle::{Candle, CandleBuilder};
use crate::model::tick::Tick;

/// Supported bar widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ResampleRule {
    OneSecond,
    FiveSeconds,
    FifteenSeconds,
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
}

impl ResampleRule {
    pub const ALL: [ResampleRule; 7] = [
        ResampleRule::OneSecond,
        ResampleRule::FiveSeconds,
        ResampleRule::FifteenSeconds,
        ResampleRule::OneMinute,
        ResampleRule::FiveMinutes,
        ResampleRule::FifteenMinutes,
        ResampleRule::OneHour,
    ];

    pub fn interval_ms(self) -> i64 {
        match self {
            Self::OneSecond => 1_000,
            Self::FiveSeconds => 5_000,
            Self::FifteenSeconds => 15_000,
            Self::OneMinute => 60_000,
            Self::FiveMinutes => 300_000,
            Self::FifteenMinutes => 900_000,
            Self::OneHour => 3_600_000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneSecond => "1s",
            Self::FiveSeconds => "5s",
            Self::FifteenSeconds => "15s",
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
            Self::FifteenMinutes => "15min",
            Self::OneHour => "1h",
        }
    }
}

impl fmt::Display for ResampleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResampleRule {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = parse_interval_ms(s).map_err(|_| AppError::InvalidInterval(s.to_string()))?;
        Self::ALL
            .into_iter()
            .find(|rule| rule.interval_ms() as u64 == ms)
            .ok_or_else(|| AppError::InvalidInterval(s.to_string()))
    }
}

impl TryFrom<String> for ResampleRule {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Group `symbol`'s ticks into non-overlapping, epoch-aligned buckets and emit
/// one OHLC bar per non-empty bucket, ascending by bucket start.
///
/// Ticks are ordered by timestamp first (stable, so equal timestamps keep
/// their input order); open and close are the first and last prices in that
/// order. Buckets without ticks produce no bar.
pub fn resample(symbol: &str, ticks: &[Tick], rule: ResampleRule) -> Vec<Candle> {
    let mut own: Vec<&Tick> = ticks.iter().filter(|t| t.symbol == symbol).collect();
    own.sort_by_key(|t| t.timestamp_ms);

    let interval_ms = rule.interval_ms();
    let mut bars = Vec::new();
    let mut current: Option<CandleBuilder> = None;
    for tick in own {
        match current.as_mut() {
            Some(builder) if builder.contains(tick.timestamp_ms) => builder.update(tick.price),
            _ => {
                if let Some(done) = current.take() {
                    bars.push(done.finish(symbol));
                }
                current = Some(CandleBuilder::new(tick.price, tick.timestamp_ms, interval_ms));
            }
        }
    }
    if let Some(done) = current {
        bars.push(done.finish(symbol));
    }
    bars
}
