//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database. The pipeline and config
//! call store methods — they never execute SQL directly.
//!
//! Three collaborator roles from the hosting shop are modelled here:
//! the platform option store (configuration), order/customer metadata
//! (attribution records), and the event log.

use crate::{error::AttributionResult, event::EventLogEntry, types::CustomerId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub struct AttributionStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl AttributionStore {
    pub fn open(path: &str) -> AttributionResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AttributionResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new isolated database.
    pub fn reopen(&self) -> AttributionResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AttributionResult<()> {
        self.conn
            .execute_batch(include_str!("../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Option store ───────────────────────────────────────────

    pub fn read_option(&self, key: &str) -> AttributionResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM option WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn write_option(&self, key: &str, value: &str) -> AttributionResult<()> {
        self.conn.execute(
            "INSERT INTO option (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // ── Order metadata (write-once per key) ────────────────────

    /// Insert order metadata. A key already present for the order is left
    /// untouched: attribution records are never mutated after creation.
    pub fn write_order_meta(
        &self,
        order_id: &str,
        meta_key: &str,
        meta_value: &str,
        at: DateTime<Utc>,
    ) -> AttributionResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO order_meta (order_id, meta_key, meta_value, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![order_id, meta_key, meta_value, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn order_meta(&self, order_id: &str, meta_key: &str) -> AttributionResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT meta_value FROM order_meta WHERE order_id = ?1 AND meta_key = ?2",
                params![order_id, meta_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// All metadata for an order, key-ordered.
    pub fn order_meta_all(&self, order_id: &str) -> AttributionResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT meta_key, meta_value FROM order_meta
             WHERE order_id = ?1 ORDER BY meta_key ASC",
        )?;
        let rows = stmt
            .query_map(params![order_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Customer metadata ──────────────────────────────────────

    /// Upsert customer metadata: a later completed order overwrites the
    /// customer's recorded attribution, mirroring the shop's user-meta
    /// semantics.
    pub fn write_customer_meta(
        &self,
        customer_id: &str,
        meta_key: &str,
        meta_value: &str,
        at: DateTime<Utc>,
    ) -> AttributionResult<()> {
        self.conn.execute(
            "INSERT INTO customer_meta (customer_id, meta_key, meta_value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(customer_id, meta_key)
             DO UPDATE SET meta_value = excluded.meta_value, updated_at = excluded.updated_at",
            params![customer_id, meta_key, meta_value, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn customer_meta(
        &self,
        customer_id: &str,
        meta_key: &str,
    ) -> AttributionResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT meta_value FROM customer_meta WHERE customer_id = ?1 AND meta_key = ?2",
                params![customer_id, meta_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn customer_ids(&self) -> AttributionResult<Vec<CustomerId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT customer_id FROM customer_meta ORDER BY customer_id ASC")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> AttributionResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (event_type, payload, recorded_at) VALUES (?1, ?2, ?3)",
            params![entry.event_type, entry.payload, entry.recorded_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn events_by_type(&self, event_type: &str) -> AttributionResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, payload, recorded_at FROM event_log
             WHERE event_type = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![event_type], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn recent_events(&self, limit: usize) -> AttributionResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, payload, recorded_at FROM event_log
             ORDER BY id DESC LIMIT ?1",
        )?;
        let mut rows = stmt
            .query_map(params![limit as i64], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    pub fn event_count(&self) -> AttributionResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventLogEntry> {
    let recorded: String = row.get(3)?;
    Ok(EventLogEntry {
        id: Some(row.get(0)?),
        event_type: row.get(1)?,
        payload: row.get(2)?,
        recorded_at: recorded
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC),
    })
}
