pub mod export;
pub mod linalg;
pub mod pipeline;
pub mod regression;
pub mod resample;
pub mod rolling;
pub mod stationarity;

/// One observation of a timestamped numeric series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl Point {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

pub fn values(series: &[Point]) -> Vec<f64> {
    series.iter().map(|p| p.value).collect()
}

/// Why an analytics result could not be produced. These are expected states
/// on sparse data, not failures.
#[derive(Debug, Clone, PartialEq)]
pub enum NotComputable {
    InsufficientData { required: usize, available: usize },
    /// The regression design is rank deficient (e.g. a constant regressor) or
    /// the fit is exact, so the statistic is undefined.
    Degenerate(&'static str),
}

impl std::fmt::Display for NotComputable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData {
                required,
                available,
            } => write!(
                f,
                "insufficient data: need {} observations, have {}",
                required, available
            ),
            Self::Degenerate(why) => write!(f, "not computable: {}", why),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Computed<T> {
    Ready(T),
    NotComputable(NotComputable),
}

impl<T> Computed<T> {
    pub fn insufficient(required: usize, available: usize) -> Self {
        Self::NotComputable(NotComputable::InsufficientData {
            required,
            available,
        })
    }

    pub fn degenerate(why: &'static str) -> Self {
        Self::NotComputable(NotComputable::Degenerate(why))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            Self::NotComputable(_) => None,
        }
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Self::Ready(v) => Some(v),
            Self::NotComputable(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Computed<U> {
        match self {
            Self::Ready(v) => Computed::Ready(f(v)),
            Self::NotComputable(why) => Computed::NotComputable(why),
        }
    }
}
