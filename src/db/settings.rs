use crate::errors::AppResult;
use crate::models::ListSort;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

pub const LIST_SORT_KEY: &str = "list_sort";

pub fn get_settings(conn: &Connection) -> AppResult<BTreeMap<String, String>> {
    let mut stmt = conn.prepare_cached("SELECT key, value FROM settings")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let settings = rows.collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(settings)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> AppResult<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Stored list ordering, falling back to the default for missing or unknown values.
pub fn get_list_sort(conn: &Connection) -> AppResult<ListSort> {
    let raw = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [LIST_SORT_KEY],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(raw.as_deref().and_then(ListSort::parse).unwrap_or_default())
}
