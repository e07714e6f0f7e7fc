mod items;
mod lists;
mod settings;

pub use items::{delete_item, get_item, insert_item, items_for_list, update_item};
pub use lists::{delete_list, insert_list, list_summaries, reorder_lists, update_list, ListChanges};
pub use settings::{get_list_sort, get_settings, set_setting, LIST_SORT_KEY};

use crate::errors::{AppError, AppResult};
use crate::models::ListSort;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const SEEDED_LIST_NAME: &str = "Todos";
const SEEDED_LIST_ICON: &str = "check";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        db.ensure_schema_extensions()?;
        db.ensure_default_settings()?;
        db.seed_default_list()?;

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Runs a read (or a single self-contained statement) on the shared connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` in one transaction; any error rolls every statement back.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> AppResult<T>) -> AppResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    fn ensure_schema_extensions(&self) -> AppResult<()> {
        let mut conn = self.lock()?;

        if !column_exists(&conn, "lists", "item_sort")? {
            conn.execute(
                "ALTER TABLE lists ADD COLUMN item_sort TEXT DEFAULT 'alphabetical'",
                [],
            )?;
        }
        if !column_exists(&conn, "lists", "sort_order")? {
            let tx = conn.transaction()?;
            tx.execute("ALTER TABLE lists ADD COLUMN sort_order INTEGER DEFAULT 0", [])?;
            let ids = {
                let mut stmt = tx.prepare("SELECT id FROM lists ORDER BY created_at, id")?;
                let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            for (index, id) in ids.iter().enumerate() {
                tx.execute(
                    "UPDATE lists SET sort_order = ?1 WHERE id = ?2",
                    params![index as i64, id],
                )?;
            }
            tx.commit()?;
            tracing::info!(lists = ids.len(), "backfilled list sort order");
        }

        // Early builds kept settings as a single-row table without a key column.
        if table_exists(&conn, "settings")? && !column_exists(&conn, "settings", "key")? {
            tracing::warn!("dropping legacy settings table");
            conn.execute("DROP TABLE settings", [])?;
        }
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
               key TEXT PRIMARY KEY,
               value TEXT NOT NULL
             );",
        )?;

        Ok(())
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![LIST_SORT_KEY, ListSort::default().as_str()],
        )?;
        Ok(())
    }

    fn seed_default_list(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM lists", [], |row| row.get(0))?;
        if count == 0 {
            insert_list(&conn, SEEDED_LIST_NAME, SEEDED_LIST_ICON)?;
        }
        Ok(())
    }
}

/// Current time in the stored text format.
///
/// Fixed-width RFC 3339 with microseconds, so text order matches time order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses stored timestamps, including the naive `CURRENT_TIMESTAMP` form
/// written by column defaults.
pub fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> AppResult<bool> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn table_exists(conn: &Connection, table: &str) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
