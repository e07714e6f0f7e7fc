use super::{parse_time, timestamp_now};
use crate::errors::AppResult;
use crate::models::{ItemSort, ListRecord, ListSort, ListSummary, DEFAULT_LIST_ICON};
use rusqlite::{params, Connection};

const LIST_COLUMNS: &str = "id, name, icon, item_sort, sort_order, created_at";

macro_rules! summary_query {
    ($order:literal) => {
        concat!(
            "SELECT l.id, l.name, l.icon, l.item_sort, l.sort_order, l.created_at,
                    COUNT(i.id) AS total_items,
                    COALESCE(SUM(CASE WHEN i.completed = 1 THEN 1 ELSE 0 END), 0) AS completed_items
             FROM lists l
             LEFT JOIN items i ON l.id = i.list_id
             GROUP BY l.id
             ORDER BY ",
            $order
        )
    };
}

fn summary_sql(sort: ListSort) -> &'static str {
    match sort {
        ListSort::Alphabetical => summary_query!("l.name COLLATE NOCASE ASC, l.id ASC"),
        ListSort::AlphabeticalDesc => summary_query!("l.name COLLATE NOCASE DESC, l.id ASC"),
        ListSort::CreatedDesc => summary_query!("l.created_at DESC, l.id DESC"),
        ListSort::CreatedAsc => summary_query!("l.created_at ASC, l.id ASC"),
        ListSort::Custom => summary_query!("l.sort_order ASC, l.created_at ASC, l.id ASC"),
    }
}

/// Field changes for one list; `None` leaves the column untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListChanges<'a> {
    pub name: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub item_sort: Option<ItemSort>,
}

impl ListChanges<'_> {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.icon.is_none() && self.item_sort.is_none()
    }
}

pub fn insert_list(conn: &Connection, name: &str, icon: &str) -> AppResult<ListRecord> {
    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM lists",
        [],
        |row| row.get(0),
    )?;
    let created_at = timestamp_now();
    conn.execute(
        "INSERT INTO lists (name, icon, item_sort, sort_order, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, icon, ItemSort::default().as_str(), sort_order, created_at],
    )?;

    Ok(ListRecord {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        icon: icon.to_string(),
        item_sort: ItemSort::default(),
        sort_order,
        created_at: parse_time(&created_at)?,
    })
}

#[cfg(test)]
fn get_list(conn: &Connection, list_id: i64) -> AppResult<Option<ListRecord>> {
    use rusqlite::OptionalExtension;

    let sql = format!("SELECT {} FROM lists WHERE id = ?1", LIST_COLUMNS);
    let list = conn
        .query_row(&sql, [list_id], parse_list_row)
        .optional()?;
    Ok(list)
}

pub fn list_summaries(conn: &Connection, sort: ListSort) -> AppResult<Vec<ListSummary>> {
    let mut stmt = conn.prepare_cached(summary_sql(sort))?;
    let rows = stmt.query_map([], |row| {
        Ok(ListSummary {
            list: parse_list_row(row)?,
            total_items: row.get(6)?,
            completed_items: row.get(7)?,
        })
    })?;
    let summaries = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(summaries)
}

/// Applies the given changes and reports whether a row matched.
pub fn update_list(conn: &Connection, list_id: i64, changes: &ListChanges<'_>) -> AppResult<bool> {
    let affected = conn.execute(
        "UPDATE lists SET
           name = COALESCE(?1, name),
           icon = COALESCE(?2, icon),
           item_sort = COALESCE(?3, item_sort)
         WHERE id = ?4",
        params![
            changes.name,
            changes.icon,
            changes.item_sort.map(ItemSort::as_str),
            list_id
        ],
    )?;
    Ok(affected > 0)
}

/// Removes a list with its items and history.
///
/// Children are deleted explicitly as well, for databases created before the
/// foreign keys existed.
pub fn delete_list(conn: &Connection, list_id: i64) -> AppResult<bool> {
    conn.execute("DELETE FROM history WHERE list_id = ?1", [list_id])?;
    conn.execute("DELETE FROM items WHERE list_id = ?1", [list_id])?;
    let affected = conn.execute("DELETE FROM lists WHERE id = ?1", [list_id])?;
    Ok(affected > 0)
}

/// Assigns `sort_order` from the position of each id; unknown ids are ignored.
pub fn reorder_lists(conn: &Connection, list_ids: &[i64]) -> AppResult<()> {
    let mut stmt = conn.prepare_cached("UPDATE lists SET sort_order = ?1 WHERE id = ?2")?;
    for (index, list_id) in list_ids.iter().enumerate() {
        stmt.execute(params![index as i64, list_id])?;
    }
    Ok(())
}

fn parse_list_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListRecord> {
    Ok(ListRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| DEFAULT_LIST_ICON.to_string()),
        item_sort: row
            .get::<_, Option<String>>(3)?
            .as_deref()
            .and_then(ItemSort::parse)
            .unwrap_or_default(),
        sort_order: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        created_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}
