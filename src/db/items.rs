use super::{parse_time, timestamp_now};
use crate::errors::AppResult;
use crate::models::{ItemRecord, ItemSort};
use rusqlite::{params, Connection, OptionalExtension};

macro_rules! items_query {
    ($filter:literal, $order:literal) => {
        concat!(
            "SELECT id, list_id, text, completed, created_at, completed_at FROM items WHERE list_id = ?1",
            $filter,
            " ORDER BY ",
            $order
        )
    };
}

fn items_sql(sort: ItemSort, include_completed: bool) -> &'static str {
    match (sort, include_completed) {
        (ItemSort::Alphabetical, false) => items_query!(" AND completed = 0", "text COLLATE NOCASE ASC, id ASC"),
        (ItemSort::AlphabeticalDesc, false) => items_query!(" AND completed = 0", "text COLLATE NOCASE DESC, id ASC"),
        (ItemSort::CreatedDesc, false) => items_query!(" AND completed = 0", "created_at DESC, id DESC"),
        (ItemSort::CreatedAsc, false) => items_query!(" AND completed = 0", "created_at ASC, id ASC"),
        (ItemSort::Alphabetical, true) => items_query!("", "completed ASC, text COLLATE NOCASE ASC, id ASC"),
        (ItemSort::AlphabeticalDesc, true) => items_query!("", "completed ASC, text COLLATE NOCASE DESC, id ASC"),
        (ItemSort::CreatedDesc, true) => items_query!("", "completed ASC, created_at DESC, id DESC"),
        (ItemSort::CreatedAsc, true) => items_query!("", "completed ASC, created_at ASC, id ASC"),
    }
}

pub fn insert_item(conn: &Connection, list_id: i64, text: &str) -> AppResult<ItemRecord> {
    let created_at = timestamp_now();
    conn.execute(
        "INSERT INTO items (list_id, text, completed, created_at) VALUES (?1, ?2, 0, ?3)",
        params![list_id, text, created_at],
    )?;

    Ok(ItemRecord {
        id: conn.last_insert_rowid(),
        list_id,
        text: text.to_string(),
        completed: false,
        created_at: parse_time(&created_at)?,
        completed_at: None,
    })
}

pub fn get_item(conn: &Connection, item_id: i64) -> AppResult<Option<ItemRecord>> {
    let item = conn
        .query_row(
            "SELECT id, list_id, text, completed, created_at, completed_at FROM items WHERE id = ?1",
            [item_id],
            parse_item_row,
        )
        .optional()?;
    Ok(item)
}

/// Items of a list in the list's own sort order.
///
/// Without `include_completed` only open items are returned; with it, open
/// items come first and completed ones follow, each group sorted the same way.
pub fn items_for_list(conn: &Connection, list_id: i64, include_completed: bool) -> AppResult<Vec<ItemRecord>> {
    let sort = conn
        .query_row("SELECT item_sort FROM lists WHERE id = ?1", [list_id], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?
        .flatten()
        .as_deref()
        .and_then(ItemSort::parse)
        .unwrap_or_default();

    let mut stmt = conn.prepare_cached(items_sql(sort, include_completed))?;
    let rows = stmt.query_map([list_id], parse_item_row)?;
    let items = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Sets text and/or completion. Completing stamps `completed_at`; reopening clears it.
pub fn update_item(conn: &Connection, item_id: i64, text: Option<&str>, completed: Option<bool>) -> AppResult<bool> {
    let affected = conn.execute(
        "UPDATE items SET
           text = COALESCE(?1, text),
           completed = COALESCE(?2, completed),
           completed_at = CASE
             WHEN ?2 IS NULL THEN completed_at
             WHEN ?2 = 1 THEN ?3
             ELSE NULL
           END
         WHERE id = ?4",
        params![text, completed, timestamp_now(), item_id],
    )?;
    Ok(affected > 0)
}

pub fn delete_item(conn: &Connection, item_id: i64) -> AppResult<bool> {
    let affected = conn.execute("DELETE FROM items WHERE id = ?1", [item_id])?;
    Ok(affected > 0)
}

fn parse_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemRecord> {
    Ok(ItemRecord {
        id: row.get(0)?,
        list_id: row.get(1)?,
        text: row.get(2)?,
        completed: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
        created_at: parse_time(&row.get::<_, String>(4)?)?,
        completed_at: row
            .get::<_, Option<String>>(5)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
    })
}
