//! Append-only audit trail of list and item changes.
//!
//! Every audited mutation writes exactly one row through the caller's open
//! transaction, so a failed insert rolls back the mutation it describes.
//! Rows are never updated afterwards; they only disappear when their list is
//! deleted.

use crate::db::{parse_time, timestamp_now};
use crate::errors::AppResult;
use crate::models::{HistoryAction, HistoryEntry, Mutation};
use rusqlite::{params, Connection};

/// Most entries returned for one list.
pub const HISTORY_LIMIT: i64 = 100;

const HISTORY_FOR_LIST_SQL: &str = "SELECT h.id, h.list_id, h.item_id, h.action, h.item_text, h.timestamp,
        i.completed AS item_current_completed, i.text AS item_current_text
 FROM history h
 LEFT JOIN items i ON h.item_id = i.id
 WHERE h.list_id = ?1
 ORDER BY h.timestamp DESC, h.id DESC
 LIMIT ?2";

impl HistoryAction {
    /// Picks the recorded action for a mutation.
    ///
    /// Undo-tagged actions name the action being reversed, not the one being
    /// performed: deleting with `undo` reverses a creation and is recorded as
    /// `undo_created`, re-creating with `undo` reverses a deletion and is
    /// recorded as `undo_deleted`.
    pub fn for_mutation(mutation: Mutation, undo: bool) -> Self {
        match (mutation, undo) {
            (Mutation::ListCreated, _) => Self::ListCreated,
            (Mutation::ItemCreated, false) => Self::ItemCreated,
            (Mutation::ItemCreated, true) => Self::UndoDeleted,
            (Mutation::ItemEdited, false) => Self::ItemEdited,
            (Mutation::ItemEdited, true) => Self::UndoEdited,
            (Mutation::ItemCompleted, false) => Self::ItemCompleted,
            (Mutation::ItemCompleted, true) => Self::UndoUncompleted,
            (Mutation::ItemUncompleted, false) => Self::ItemUncompleted,
            (Mutation::ItemUncompleted, true) => Self::UndoCompleted,
            (Mutation::ItemDeleted, false) => Self::ItemDeleted,
            (Mutation::ItemDeleted, true) => Self::UndoCreated,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub list_id: i64,
    pub item_id: Option<i64>,
    pub mutation: Mutation,
    pub undo: bool,
    pub snapshot: String,
}

impl HistoryRecord {
    pub fn list(list_id: i64, mutation: Mutation, snapshot: impl Into<String>) -> Self {
        Self {
            list_id,
            item_id: None,
            mutation,
            undo: false,
            snapshot: snapshot.into(),
        }
    }

    pub fn item(list_id: i64, item_id: i64, mutation: Mutation, undo: bool, snapshot: impl Into<String>) -> Self {
        Self {
            list_id,
            item_id: Some(item_id),
            mutation,
            undo,
            snapshot: snapshot.into(),
        }
    }

    pub fn action(&self) -> HistoryAction {
        HistoryAction::for_mutation(self.mutation, self.undo)
    }
}

/// Snapshot text for a text edit.
pub fn edit_snapshot(before: &str, after: &str) -> String {
    format!("{} → {}", before, after)
}

/// Appends one history row and returns the action it was tagged with.
pub fn record(conn: &Connection, record: &HistoryRecord) -> AppResult<HistoryAction> {
    let action = record.action();
    conn.execute(
        "INSERT INTO history (list_id, item_id, action, item_text, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.list_id,
            record.item_id,
            action.as_str(),
            record.snapshot,
            timestamp_now()
        ],
    )?;
    tracing::debug!(
        list_id = record.list_id,
        item_id = ?record.item_id,
        action = action.as_str(),
        undo = action.is_undo(),
        "history recorded"
    );
    Ok(action)
}

/// Newest entries for a list, joined with the current state of their item.
pub fn history_for_list(conn: &Connection, list_id: i64) -> AppResult<Vec<HistoryEntry>> {
    let mut statement = conn.prepare_cached(HISTORY_FOR_LIST_SQL)?;
    let rows = statement.query_map(params![list_id, HISTORY_LIMIT], parse_history_row)?;
    let entries = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn parse_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        list_id: row.get(1)?,
        item_id: row.get(2)?,
        action: parse_action(&row.get::<_, String>(3)?)?,
        item_text: row.get(4)?,
        timestamp: parse_time(&row.get::<_, String>(5)?)?,
        item_current_completed: row.get::<_, Option<i64>>(6)?.map(|value| value != 0),
        item_current_text: row.get(7)?,
    })
}

fn parse_action(raw: &str) -> rusqlite::Result<HistoryAction> {
    HistoryAction::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown history action '{}'", raw),
            )),
        )
    })
}
