use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::AppError;
use crate::model::tick::Tick;

/// Timestamp-indexed numeric table, the unit of CSV export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<(i64, Vec<f64>)>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, timestamp_ms: i64, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push((timestamp_ms, values));
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// UTF-8 CSV: `timestamp` (ISO-8601 UTC, millisecond precision) followed
    /// by one column per series. NaN values become empty fields.
    pub fn to_csv_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str("timestamp");
        for col in &self.columns {
            out.push(',');
            out.push_str(&escape_field(col));
        }
        out.push('\n');

        for (ts, values) in &self.rows {
            out.push_str(&format_timestamp(*ts));
            for v in values {
                out.push(',');
                if v.is_finite() {
                    out.push_str(&v.to_string());
                }
            }
            out.push('\n');
        }
        out.into_bytes()
    }
}

pub fn format_timestamp(ts_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ts_ms) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => ts_ms.to_string(),
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn unquote(field: &str) -> &str {
    let f = field.trim();
    f.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(f)
}

/// Parse a timestamp cell: epoch milliseconds, RFC 3339, or
/// `YYYY-MM-DD HH:MM:SS[.fff]` taken as UTC.
pub fn parse_timestamp(cell: &str) -> Option<i64> {
    let cell = unquote(cell);
    if let Ok(ms) = cell.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Read an uploaded OHLC CSV (timestamp in the first column, a `close` column
/// somewhere) into zero-quantity ticks for `symbol`. Rows with an empty close
/// are skipped.
pub fn ticks_from_ohlc_csv(text: &str, symbol: &str) -> Result<Vec<Tick>, AppError> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let Some((_, header)) = lines.next() else {
        return Ok(Vec::new());
    };
    let close_idx = header
        .split(',')
        .position(|h| unquote(h).eq_ignore_ascii_case("close"))
        .ok_or_else(|| AppError::Csv("missing `close` column".to_string()))?;
    if close_idx == 0 {
        return Err(AppError::Csv(
            "first column must hold the timestamp".to_string(),
        ));
    }

    let mut ticks = Vec::new();
    for (line_no, line) in lines {
        let cells: Vec<&str> = line.split(',').collect();
        let ts = cells
            .first()
            .and_then(|c| parse_timestamp(c))
            .ok_or_else(|| AppError::Csv(format!("line {}: bad timestamp", line_no + 1)))?;
        let close_cell = cells.get(close_idx).map(|c| unquote(c)).unwrap_or("");
        if close_cell.is_empty() {
            continue;
        }
        let close: f64 = close_cell
            .parse()
            .map_err(|_| AppError::Csv(format!("line {}: bad close '{}'", line_no + 1, close_cell)))?;
        ticks.push(Tick::from_close(ts, symbol, close));
    }
    Ok(ticks)
}
