use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::AppError;
use crate::model::tick::Tick;

pub const IN_MEMORY_PATH: &str = ":memory:";

/// How long a write waits on another connection's lock before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TICK_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ticks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    price REAL NOT NULL,
    qty REAL
);
CREATE INDEX IF NOT EXISTS idx_ticks_symbol_ts ON ticks(symbol, ts);
"#;

/// Append-only tick table behind one shared sqlite connection.
///
/// Every call locks the connection for exactly one statement, so the ingest
/// writer and analytics readers interleave at statement granularity. Rows are
/// stored in arrival order; ordering is applied by queries. No call path
/// takes the lock twice, so a plain mutex stands in for a reentrant one.
pub struct TickStore {
    path: String,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for TickStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickStore").field("path", &self.path).finish()
    }
}

impl TickStore {
    /// Open (creating if absent) the store at `path` with WAL journaling.
    pub fn open(path: &str) -> Result<Arc<Self>, AppError> {
        let conn = if path == IN_MEMORY_PATH {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(path)?
        };
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if path != IN_MEMORY_PATH && !mode.eq_ignore_ascii_case("wal") {
            return Err(AppError::Config(format!(
                "tick store {} refused WAL journaling (journal_mode={})",
                path, mode
            )));
        }
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(TICK_SCHEMA)?;
        tracing::info!(path = %path, journal_mode = %mode, "Tick store opened");
        Ok(Arc::new(Self {
            path: path.to_string(),
            conn: Mutex::new(conn),
        }))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Append one tick. The row is committed before this returns.
    pub fn insert(&self, ts: i64, symbol: &str, price: f64, qty: f64) -> Result<(), AppError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ticks (ts, symbol, price, qty) VALUES (?1, ?2, ?3, ?4)",
            params![ts, symbol, price, qty],
        )?;
        Ok(())
    }

    pub fn insert_tick(&self, tick: &Tick) -> Result<(), AppError> {
        self.insert(tick.timestamp_ms, &tick.symbol, tick.price, tick.qty)
    }

    /// Ticks for any of `symbols` with `start_ts <= ts <= end_ts` (bounds
    /// optional), ascending by timestamp. An empty symbol set matches nothing.
    pub fn get_ticks<S: AsRef<str>>(
        &self,
        symbols: &[S],
        start_ts: Option<i64>,
        end_ts: Option<i64>,
    ) -> Result<Vec<Tick>, AppError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; symbols.len()].join(",");
        let mut sql = format!(
            "SELECT ts, symbol, price, qty FROM ticks WHERE symbol IN ({})",
            placeholders
        );
        let mut args: Vec<Value> = symbols
            .iter()
            .map(|s| Value::Text(s.as_ref().to_string()))
            .collect();
        if let Some(start) = start_ts {
            sql.push_str(" AND ts >= ?");
            args.push(Value::Integer(start));
        }
        if let Some(end) = end_ts {
            sql.push_str(" AND ts <= ?");
            args.push(Value::Integer(end));
        }
        sql.push_str(" ORDER BY ts ASC, id ASC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(Tick {
                timestamp_ms: row.get(0)?,
                symbol: row.get(1)?,
                price: row.get(2)?,
                qty: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            })
        })?;

        let mut ticks = Vec::new();
        for row in rows {
            ticks.push(row?);
        }
        Ok(ticks)
    }

    /// Largest stored timestamp for `symbol`, `None` if it has no ticks.
    pub fn get_latest_timestamp(&self, symbol: &str) -> Result<Option<i64>, AppError> {
        let conn = self.conn.lock();
        let latest = conn
            .query_row(
                "SELECT MAX(ts) FROM ticks WHERE symbol = ?1",
                [symbol],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(latest.flatten())
    }

    /// Row count per symbol, ordered by symbol.
    pub fn symbol_counts(&self) -> Result<Vec<(String, u64)>, AppError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT symbol, COUNT(*) FROM ticks GROUP BY symbol ORDER BY symbol")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }
}

/// Hands out one shared [`TickStore`] per backing path.
///
/// Two connections to the same file would contend for sqlite's write lock, so
/// every collaborator that needs a path should come through the same registry.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<String, Arc<TickStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, path: &str) -> Result<Arc<TickStore>, AppError> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(path) {
            return Ok(Arc::clone(store));
        }
        let store = TickStore::open(path)?;
        stores.insert(path.to_string(), Arc::clone(&store));
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
