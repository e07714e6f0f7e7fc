use crate::broadcaster::{Broadcaster, Subscription};
use crate::db::{self, Database, ListChanges};
use crate::errors::{AppError, AppResult};
use crate::history::{self, edit_snapshot, HistoryRecord};
use crate::models::{
    ChangeEvent, CreateItemPayload, CreateListPayload, CreatedItemResponse, CreatedListResponse, HistoryEntry,
    ItemRecord, ItemSort, ListSort, ListSummary, Mutation, ReorderListsPayload, SettingsUpdatePayload,
    UpdateItemPayload, UpdateListPayload,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Application core shared by every request.
///
/// Each mutation writes the store and its history rows in one transaction,
/// then notifies live clients once the transaction has committed. Failed
/// writes record and publish nothing.
#[derive(Clone)]
pub struct TickrCore {
    db: Arc<Database>,
    broadcaster: Broadcaster,
}

impl TickrCore {
    pub fn new(db: Arc<Database>, broadcaster: Broadcaster) -> Self {
        Self { db, broadcaster }
    }

    pub fn open(db_path: &Path, event_capacity: usize) -> AppResult<Self> {
        let db = Arc::new(Database::new(db_path)?);
        tracing::info!(path = %db_path.display(), "database ready");
        Ok(Self::new(db, Broadcaster::new(event_capacity)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn list_lists(&self) -> AppResult<Vec<ListSummary>> {
        self.db.with_connection(|conn| {
            let sort = db::get_list_sort(conn)?;
            db::list_summaries(conn, sort)
        })
    }

    pub fn create_list(&self, payload: CreateListPayload) -> AppResult<CreatedListResponse> {
        let list = self.db.with_transaction(|tx| {
            let list = db::insert_list(tx, &payload.name, &payload.icon)?;
            history::record(tx, &HistoryRecord::list(list.id, Mutation::ListCreated, &payload.name))?;
            Ok(list)
        })?;
        tracing::info!(list_id = list.id, "list created");
        self.broadcaster.publish(ChangeEvent::lists_changed(None));

        Ok(CreatedListResponse {
            id: list.id,
            name: list.name,
            icon: list.icon,
        })
    }

    pub fn update_list(&self, list_id: i64, payload: UpdateListPayload) -> AppResult<()> {
        let item_sort = payload
            .item_sort
            .as_deref()
            .map(|raw| {
                ItemSort::parse(raw).ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "Invalid sort option. Valid options: {}",
                        ItemSort::valid_options()
                    ))
                })
            })
            .transpose()?;

        let changes = ListChanges {
            name: payload.name.as_deref(),
            icon: payload.icon.as_deref(),
            item_sort,
        };
        if changes.is_empty() {
            return Ok(());
        }

        let matched = self.db.with_transaction(|tx| db::update_list(tx, list_id, &changes))?;
        if matched {
            tracing::info!(list_id, "list updated");
            self.broadcaster.publish(ChangeEvent::lists_changed(Some(list_id)));
        }
        Ok(())
    }

    pub fn delete_list(&self, list_id: i64) -> AppResult<()> {
        let removed = self.db.with_transaction(|tx| db::delete_list(tx, list_id))?;
        if removed {
            tracing::info!(list_id, "list deleted");
        }
        self.broadcaster.publish(ChangeEvent::lists_changed(None));
        Ok(())
    }

    pub fn reorder_lists(&self, payload: ReorderListsPayload) -> AppResult<()> {
        self.db.with_transaction(|tx| db::reorder_lists(tx, &payload.list_ids))?;
        tracing::info!(lists = payload.list_ids.len(), "lists reordered");
        self.broadcaster.publish(ChangeEvent::lists_changed(None));
        Ok(())
    }

    pub fn list_items(&self, list_id: i64, include_completed: bool) -> AppResult<Vec<ItemRecord>> {
        self.db
            .with_connection(|conn| db::items_for_list(conn, list_id, include_completed))
    }

    pub fn create_item(&self, list_id: i64, payload: CreateItemPayload) -> AppResult<CreatedItemResponse> {
        let item = self.db.with_transaction(|tx| {
            let item = db::insert_item(tx, list_id, &payload.text)?;
            history::record(
                tx,
                &HistoryRecord::item(list_id, item.id, Mutation::ItemCreated, payload.undo, &payload.text),
            )?;
            Ok(item)
        })?;
        tracing::info!(list_id, item_id = item.id, undo = payload.undo, "item created");
        self.broadcaster.publish(ChangeEvent::items_changed(list_id));

        Ok(CreatedItemResponse {
            id: item.id,
            list_id: item.list_id,
            text: item.text,
            completed: item.completed,
        })
    }

    /// Applies text and completion changes, recording one history row per change.
    ///
    /// Text identical to the stored text is not a change. Completion is always
    /// applied when given, even if the item is already in that state.
    pub fn update_item(&self, item_id: i64, payload: UpdateItemPayload) -> AppResult<()> {
        let list_id = self.db.with_transaction(|tx| {
            let current = db::get_item(tx, item_id)?
                .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

            let new_text = payload
                .text
                .as_deref()
                .filter(|text| *text != current.text);
            if new_text.is_none() && payload.completed.is_none() {
                return Ok(None);
            }

            db::update_item(tx, item_id, new_text, payload.completed)?;

            if let Some(text) = new_text {
                history::record(
                    tx,
                    &HistoryRecord::item(
                        current.list_id,
                        item_id,
                        Mutation::ItemEdited,
                        payload.undo,
                        edit_snapshot(&current.text, text),
                    ),
                )?;
            }
            if let Some(completed) = payload.completed {
                let mutation = if completed {
                    Mutation::ItemCompleted
                } else {
                    Mutation::ItemUncompleted
                };
                let snapshot = payload
                    .text
                    .as_deref()
                    .filter(|text| !text.is_empty())
                    .unwrap_or(&current.text);
                history::record(
                    tx,
                    &HistoryRecord::item(current.list_id, item_id, mutation, payload.undo, snapshot),
                )?;
            }
            Ok(Some(current.list_id))
        })?;

        if let Some(list_id) = list_id {
            tracing::info!(list_id, item_id, undo = payload.undo, "item updated");
            self.broadcaster.publish(ChangeEvent::items_changed(list_id));
        }
        Ok(())
    }

    /// Deletes an item. A missing item is not an error and changes nothing.
    pub fn delete_item(&self, item_id: i64, undo: bool) -> AppResult<()> {
        let list_id = self.db.with_transaction(|tx| {
            let Some(current) = db::get_item(tx, item_id)? else {
                return Ok(None);
            };
            history::record(
                tx,
                &HistoryRecord::item(current.list_id, item_id, Mutation::ItemDeleted, undo, &current.text),
            )?;
            db::delete_item(tx, item_id)?;
            Ok(Some(current.list_id))
        })?;

        if let Some(list_id) = list_id {
            tracing::info!(list_id, item_id, undo, "item deleted");
            self.broadcaster.publish(ChangeEvent::items_changed(list_id));
        }
        Ok(())
    }

    pub fn get_settings(&self) -> AppResult<BTreeMap<String, String>> {
        self.db.with_connection(db::get_settings)
    }

    pub fn update_settings(&self, payload: SettingsUpdatePayload) -> AppResult<()> {
        if let Some(raw) = payload.list_sort.as_deref() {
            let sort = ListSort::parse(raw).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Invalid list sort option. Valid: {}",
                    ListSort::valid_options()
                ))
            })?;
            self.db
                .with_connection(|conn| db::set_setting(conn, db::LIST_SORT_KEY, sort.as_str()))?;
            tracing::info!(list_sort = sort.as_str(), "settings updated");
        }
        Ok(())
    }

    pub fn list_history(&self, list_id: i64) -> AppResult<Vec<HistoryEntry>> {
        self.db
            .with_connection(|conn| history::history_for_list(conn, list_id))
    }
}
