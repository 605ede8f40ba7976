//! Result sink: latest snapshot per symbol.
//!
//! Writes are per-symbol upserts, never delete-then-insert, so readers never
//! see an empty table mid-cycle. An upsert only replaces a row when its scan
//! timestamp is at least as new as the stored one. Pruning by age is a
//! separate, idempotent operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::SinkError;
use crate::types::{rank_order, Catalyst, InstrumentSnapshot, SignalGrid, SnapshotParts};

/// Durable keyed store for scan results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Insert or replace by symbol. Returns rows written.
    async fn upsert(&self, snapshots: &[InstrumentSnapshot]) -> Result<usize, SinkError>;

    /// Current rows ordered by change percent descending, then symbol.
    async fn top(&self, limit: usize) -> Result<Vec<InstrumentSnapshot>, SinkError>;

    /// Delete rows scanned before `older_than`. Returns rows removed.
    async fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, SinkError>;

    async fn count(&self) -> Result<usize, SinkError>;
}

/// SQLite-backed sink.
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    /// Open (or create) the store at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.init_schema()?;
        info!("SQLite result store initialized");
        Ok(store)
    }

    /// In-memory store (for testing).
    pub fn new_in_memory() -> Result<Self, SinkError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        debug!("In-memory SQLite result store initialized");
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SinkError> {
        self.conn.lock().map_err(|_| SinkError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), SinkError> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS momentum_scans (
                symbol TEXT PRIMARY KEY,
                price REAL NOT NULL,
                previous_close REAL NOT NULL,
                change_percent REAL NOT NULL,
                volume REAL NOT NULL,
                average_volume REAL NOT NULL,
                estimated_float REAL,
                catalyst_headline TEXT,
                catalyst_published_at INTEGER,
                signal_grid TEXT NOT NULL DEFAULT '{}',
                scan_timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_momentum_scans_timestamp
                ON momentum_scans(scan_timestamp);
            CREATE INDEX IF NOT EXISTS idx_momentum_scans_change
                ON momentum_scans(change_percent DESC);",
        )?;

        Ok(())
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<InstrumentSnapshot> {
        let grid_json: String = row.get(9)?;
        let signal_grid: SignalGrid = serde_json::from_str(&grid_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

        let headline: Option<String> = row.get(7)?;
        let published_at: Option<i64> = row.get(8)?;
        let catalyst = match (headline, published_at) {
            (Some(headline), Some(ms)) => Some(Catalyst {
                headline,
                published_at: from_millis(8, ms)?,
            }),
            _ => None,
        };

        Ok(InstrumentSnapshot::new(SnapshotParts {
            symbol: row.get(0)?,
            price: row.get(1)?,
            previous_close: row.get(2)?,
            volume: row.get(4)?,
            average_volume: row.get(5)?,
            estimated_float: row.get(6)?,
            catalyst,
            signal_grid,
            scan_timestamp: from_millis(10, row.get(10)?)?,
        }))
    }

    /// Stored snapshot for one symbol.
    pub fn get(&self, symbol: &str) -> Result<Option<InstrumentSnapshot>, SinkError> {
        let conn = self.lock()?;
        let snapshot = conn
            .query_row(
                &format!("{} WHERE symbol = ?1", SELECT_COLUMNS),
                params![symbol.to_uppercase()],
                Self::read_row,
            )
            .optional()?;
        Ok(snapshot)
    }
}

const SELECT_COLUMNS: &str = "SELECT symbol, price, previous_close, change_percent, volume,
    average_volume, estimated_float, catalyst_headline, catalyst_published_at,
    signal_grid, scan_timestamp FROM momentum_scans";

fn from_millis(column: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(column, ms))
}

#[async_trait]
impl ResultSink for SqliteResultStore {
    async fn upsert(&self, snapshots: &[InstrumentSnapshot]) -> Result<usize, SinkError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO momentum_scans (
                    symbol, price, previous_close, change_percent, volume, average_volume,
                    estimated_float, catalyst_headline, catalyst_published_at,
                    signal_grid, scan_timestamp
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(symbol) DO UPDATE SET
                    price = excluded.price,
                    previous_close = excluded.previous_close,
                    change_percent = excluded.change_percent,
                    volume = excluded.volume,
                    average_volume = excluded.average_volume,
                    estimated_float = excluded.estimated_float,
                    catalyst_headline = excluded.catalyst_headline,
                    catalyst_published_at = excluded.catalyst_published_at,
                    signal_grid = excluded.signal_grid,
                    scan_timestamp = excluded.scan_timestamp
                 WHERE excluded.scan_timestamp >= momentum_scans.scan_timestamp",
            )?;

            for snapshot in snapshots {
                let grid = serde_json::to_string(snapshot.signal_grid())?;
                written += stmt.execute(params![
                    snapshot.symbol(),
                    snapshot.price(),
                    snapshot.previous_close(),
                    snapshot.change_percent(),
                    snapshot.volume(),
                    snapshot.average_volume(),
                    snapshot.estimated_float(),
                    snapshot.catalyst().map(|c| c.headline.as_str()),
                    snapshot.catalyst().map(|c| c.published_at.timestamp_millis()),
                    grid,
                    snapshot.scan_timestamp().timestamp_millis(),
                ])?;
            }
        }

        tx.commit()?;
        debug!(rows = written, "Upserted scan results");
        Ok(written)
    }

    async fn top(&self, limit: usize) -> Result<Vec<InstrumentSnapshot>, SinkError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY change_percent DESC, symbol ASC LIMIT ?1",
            SELECT_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![limit as i64], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, SinkError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM momentum_scans WHERE scan_timestamp < ?1",
            params![older_than.timestamp_millis()],
        )?;
        if removed > 0 {
            info!(removed, "Pruned stale scan results");
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, SinkError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM momentum_scans", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// In-process sink with the same semantics as [`SqliteResultStore`].
#[derive(Default)]
pub struct MemoryResultStore {
    rows: DashMap<String, InstrumentSnapshot>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<InstrumentSnapshot> {
        self.rows.get(&symbol.to_uppercase()).map(|r| r.value().clone())
    }
}

#[async_trait]
impl ResultSink for MemoryResultStore {
    async fn upsert(&self, snapshots: &[InstrumentSnapshot]) -> Result<usize, SinkError> {
        let mut written = 0;
        for snapshot in snapshots {
            let mut entry = self
                .rows
                .entry(snapshot.symbol().to_string())
                .or_insert_with(|| snapshot.clone());
            if snapshot.scan_timestamp() >= entry.scan_timestamp() {
                *entry = snapshot.clone();
                written += 1;
            }
        }
        Ok(written)
    }

    async fn top(&self, limit: usize) -> Result<Vec<InstrumentSnapshot>, SinkError> {
        let mut rows: Vec<InstrumentSnapshot> =
            self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(rank_order);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, SinkError> {
        let before = self.rows.len();
        self.rows.retain(|_, s| s.scan_timestamp() >= older_than);
        Ok(before - self.rows.len())
    }

    async fn count(&self) -> Result<usize, SinkError> {
        Ok(self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModelKind, MomentumSignal, Timeframe};
    use chrono::Duration;

    fn snapshot(symbol: &str, price: f64, at: DateTime<Utc>) -> InstrumentSnapshot {
        let mut grid = SignalGrid::new();
        grid.set(ModelKind::ModelA, Timeframe::OneHour, MomentumSignal::Bullish);
        InstrumentSnapshot::new(SnapshotParts {
            symbol: symbol.into(),
            price,
            previous_close: 10.0,
            volume: 2_000_000.0,
            average_volume: 200_000.0,
            estimated_float: Some(4_000_000.0),
            catalyst: Some(Catalyst {
                headline: "Contract win".into(),
                published_at: at - Duration::hours(1),
            }),
            signal_grid: grid,
            // Millisecond precision, as stored.
            scan_timestamp: DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let store = SqliteResultStore::new_in_memory().unwrap();
        let now = Utc::now();
        let snap = snapshot("abcd", 12.0, now);
        assert_eq!(store.upsert(&[snap.clone()]).await.unwrap(), 1);

        let stored = store.get("ABCD").unwrap().unwrap();
        assert_eq!(stored.symbol(), "ABCD");
        assert_eq!(stored.signal_grid(), snap.signal_grid());
        assert_eq!(stored.catalyst_headline(), Some("Contract win"));
        assert_eq!(stored.estimated_float(), Some(4_000_000.0));
        assert_eq!(stored.scan_timestamp(), snap.scan_timestamp());
    }

    #[tokio::test]
    async fn test_sqlite_upsert_is_idempotent() {
        let store = SqliteResultStore::new_in_memory().unwrap();
        let t0 = Utc::now() - Duration::minutes(5);
        let t1 = Utc::now();

        store.upsert(&[snapshot("ABCD", 11.0, t0)]).await.unwrap();
        store.upsert(&[snapshot("ABCD", 13.0, t1)]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("ABCD").unwrap().unwrap().price(), 13.0);
    }

    #[tokio::test]
    async fn test_sqlite_older_snapshot_does_not_overwrite() {
        let store = SqliteResultStore::new_in_memory().unwrap();
        let t1 = Utc::now();
        let t0 = t1 - Duration::minutes(5);

        store.upsert(&[snapshot("ABCD", 13.0, t1)]).await.unwrap();
        assert_eq!(store.upsert(&[snapshot("ABCD", 11.0, t0)]).await.unwrap(), 0);
        assert_eq!(store.get("ABCD").unwrap().unwrap().price(), 13.0);
    }

    #[tokio::test]
    async fn test_sqlite_top_orders_and_limits() {
        let store = SqliteResultStore::new_in_memory().unwrap();
        let now = Utc::now();
        store
            .upsert(&[
                snapshot("BBB", 12.0, now),
                snapshot("AAA", 12.0, now),
                snapshot("CCC", 15.0, now),
                snapshot("DDD", 11.0, now),
            ])
            .await
            .unwrap();

        let top = store.top(3).await.unwrap();
        let symbols: Vec<&str> = top.iter().map(|s| s.symbol()).collect();
        assert_eq!(symbols, vec!["CCC", "AAA", "BBB"]);
    }

    #[tokio::test]
    async fn test_sqlite_prune() {
        let store = SqliteResultStore::new_in_memory().unwrap();
        let now = Utc::now();
        store
            .upsert(&[
                snapshot("OLD", 12.0, now - Duration::hours(30)),
                snapshot("NEW", 12.0, now),
            ])
            .await
            .unwrap();

        let cutoff = now - Duration::hours(24);
        assert_eq!(store.prune(cutoff).await.unwrap(), 1);
        assert_eq!(store.prune(cutoff).await.unwrap(), 0);
        assert!(store.get("OLD").unwrap().is_none());
        assert!(store.get("NEW").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_store_matches_sqlite() {
        let store = MemoryResultStore::new();
        let t1 = Utc::now();
        let t0 = t1 - Duration::minutes(5);

        store.upsert(&[snapshot("ABCD", 11.0, t0)]).await.unwrap();
        store.upsert(&[snapshot("ABCD", 13.0, t1)]).await.unwrap();
        assert_eq!(store.upsert(&[snapshot("ABCD", 9.0, t0)]).await.unwrap(), 0);
        store.upsert(&[snapshot("AAAA", 13.0, t1)]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.get("abcd").unwrap().price(), 13.0);

        let top = store.top(10).await.unwrap();
        assert_eq!(top[0].symbol(), "AAAA");

        assert_eq!(store.prune(t1 + Duration::seconds(1)).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
