#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_time: i64,
    pub close_time: i64,
}

/// Bucket start for `timestamp_ms`, aligned to the epoch. Negative timestamps
/// floor toward minus infinity.
pub fn bucket_start(timestamp_ms: i64, interval_ms: i64) -> i64 {
    timestamp_ms - timestamp_ms.rem_euclid(interval_ms)
}

/// Aggregates trade ticks into a single candle over a time interval.
#[derive(Debug, Clone)]
pub struct CandleBuilder {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_time: i64,
    pub close_time: i64,
}

impl CandleBuilder {
    /// Start a new candle. The bucket is aligned to the interval.
    pub fn new(price: f64, timestamp_ms: i64, interval_ms: i64) -> Self {
        assert!(interval_ms > 0, "interval_ms must be > 0");
        let open_time = bucket_start(timestamp_ms, interval_ms);
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            open_time,
            close_time: open_time + interval_ms,
        }
    }

    /// Update the candle with a new trade price.
    pub fn update(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    /// Check if a timestamp belongs to this candle's time bucket.
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.open_time && timestamp_ms < self.close_time
    }

    /// Finalize into an immutable Candle.
    pub fn finish(&self, symbol: &str) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            open_time: self.open_time,
            close_time: self.close_time,
        }
    }
}
