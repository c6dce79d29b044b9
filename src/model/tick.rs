/// One trade print as recorded by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub timestamp_ms: i64,
    pub symbol: String,
    pub price: f64,
    pub qty: f64,
}

impl Tick {
    pub fn new(timestamp_ms: i64, symbol: impl Into<String>, price: f64, qty: f64) -> Self {
        Self {
            timestamp_ms,
            symbol: symbol.into(),
            price,
            qty,
        }
    }

    /// Create a synthetic zero-quantity tick from a close price (uploaded bars).
    pub fn from_close(timestamp_ms: i64, symbol: impl Into<String>, close: f64) -> Self {
        Self::new(timestamp_ms, symbol, close, 0.0)
    }
}
