//! SQLite output backend (feature `sqlite`).
//!
//! Creates a single `dispatch.db` file in the configured output directory
//! with three tables: `dispatch_events`, `tick_summaries`, `kind_metrics`.
//! Not-applicable id columns are stored as `NULL`.

use std::path::Path;

use rusqlite::Connection;

use crate::writer::OutputWriter;
use crate::{DispatchEventRow, KindMetricsRow, OutputResult, TickSummaryRow};

/// Writes dispatch output to an SQLite database.
pub struct SqliteWriter {
    conn:     Connection,
    finished: bool,
}

impl SqliteWriter {
    /// Open (or create) `dispatch.db` in `dir` and initialise the schema.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let conn = Connection::open(dir.join("dispatch.db"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS dispatch_events (
                 tick       INTEGER NOT NULL,
                 event      TEXT    NOT NULL,
                 request_id INTEGER,
                 kind       TEXT,
                 target_id  INTEGER,
                 source_id  INTEGER,
                 detail     TEXT    NOT NULL
             );
             CREATE TABLE IF NOT EXISTS tick_summaries (
                 tick              INTEGER PRIMARY KEY,
                 live_requests     INTEGER NOT NULL,
                 bound_requests    INTEGER NOT NULL,
                 reversed_requests INTEGER NOT NULL,
                 vehicles_idle     INTEGER NOT NULL,
                 vehicles_busy     INTEGER NOT NULL,
                 vehicles_disabled INTEGER NOT NULL,
                 queries_in_flight INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS kind_metrics (
                 kind               TEXT PRIMARY KEY,
                 bindings           INTEGER NOT NULL,
                 serviced           INTEGER NOT NULL,
                 dropped            INTEGER NOT NULL,
                 failed_searches    INTEGER NOT NULL,
                 avg_response_ticks REAL    NOT NULL
             );",
        )?;

        Ok(Self { conn, finished: false })
    }
}

fn nullable(id: u32) -> Option<u32> {
    (id != u32::MAX).then_some(id)
}

impl OutputWriter for SqliteWriter {
    fn write_events(&mut self, rows: &[DispatchEventRow]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO dispatch_events \
                 (tick, event, request_id, kind, target_id, source_id, detail) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.tick as i64,
                    row.event.as_str(),
                    nullable(row.request),
                    row.kind.map(|k| k.as_str()),
                    nullable(row.target),
                    nullable(row.source),
                    row.detail,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()> {
        self.conn.execute(
            "INSERT INTO tick_summaries \
             (tick, live_requests, bound_requests, reversed_requests, \
              vehicles_idle, vehicles_busy, vehicles_disabled, queries_in_flight) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                row.tick as i64,
                row.live_requests as i64,
                row.bound_requests as i64,
                row.reversed_requests as i64,
                row.vehicles_idle as i64,
                row.vehicles_busy as i64,
                row.vehicles_disabled as i64,
                row.queries_in_flight as i64,
            ],
        )?;
        Ok(())
    }

    fn write_kind_metrics(&mut self, rows: &[KindMetricsRow]) -> OutputResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO kind_metrics \
                 (kind, bindings, serviced, dropped, failed_searches, avg_response_ticks) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.kind.as_str(),
                    row.bindings,
                    row.serviced,
                    row.dropped,
                    row.failed_searches,
                    row.avg_response as f64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
