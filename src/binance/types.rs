use serde::Deserialize;
use serde_json::Value;

use crate::model::tick::Tick;

/// Read a Binance number that may arrive either as a JSON string or a number.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|v| v as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Binance trade stream event (`<symbol>@trade`). Every field is optional at
/// this layer; [`TradeFrame::into_tick`] decides what is required.
#[derive(Debug, Default, Deserialize)]
pub struct TradeFrame {
    #[serde(rename = "E", default)]
    pub event_time: Option<Value>,
    #[serde(rename = "T", default)]
    pub trade_time: Option<Value>,
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,
    #[serde(rename = "p", default)]
    pub price: Option<Value>,
    #[serde(rename = "q", default)]
    pub qty: Option<Value>,
    #[serde(rename = "Q", default)]
    pub quote_qty: Option<Value>,
}

impl TradeFrame {
    /// Trade time, else event time, else `received_ms`. A zero timestamp counts
    /// as absent.
    pub fn timestamp_ms(&self, received_ms: i64) -> i64 {
        self.trade_time
            .as_ref()
            .and_then(value_as_i64)
            .filter(|ts| *ts != 0)
            .or_else(|| {
                self.event_time
                    .as_ref()
                    .and_then(value_as_i64)
                    .filter(|ts| *ts != 0)
            })
            .unwrap_or(received_ms)
    }

    pub fn into_tick(self, received_ms: i64) -> Option<Tick> {
        let symbol = self.symbol.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let price = self
            .price
            .as_ref()
            .and_then(value_as_f64)
            .filter(|p| p.is_finite() && *p > 0.0)?;
        let qty = [self.qty.as_ref(), self.quote_qty.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(value_as_f64)
            .find(|q| q.is_finite() && *q >= 0.0)
            .unwrap_or(0.0);
        Some(Tick {
            timestamp_ms: self.timestamp_ms(received_ms),
            symbol: symbol.to_string(),
            price,
            qty,
        })
    }
}

/// Parse one inbound frame into a tick. Combined-stream frames wrap the event
/// as `{"stream": ..., "data": {...}}`; bare events are accepted too. Returns
/// `None` for anything that is not a usable trade.
pub fn parse_trade_frame(text: &str, received_ms: i64) -> Option<Tick> {
    let mut root: Value = serde_json::from_str(text).ok()?;
    let payload = match root.get_mut("data").map(Value::take) {
        Some(data) => data,
        None => root,
    };
    if !payload.is_object() {
        return None;
    }
    let frame: TradeFrame = serde_json::from_value(payload).ok()?;
    frame.into_tick(received_ms)
}
