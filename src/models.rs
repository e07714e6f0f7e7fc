use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIST_ICON: &str = "list";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSort {
    #[default]
    Alphabetical,
    AlphabeticalDesc,
    CreatedDesc,
    CreatedAsc,
}

impl ItemSort {
    pub const ALL: [ItemSort; 4] = [
        Self::Alphabetical,
        Self::AlphabeticalDesc,
        Self::CreatedDesc,
        Self::CreatedAsc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alphabetical => "alphabetical",
            Self::AlphabeticalDesc => "alphabetical_desc",
            Self::CreatedDesc => "created_desc",
            Self::CreatedAsc => "created_asc",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sort| sort.as_str() == raw)
    }

    pub fn valid_options() -> String {
        join_options(Self::ALL.iter().map(|sort| sort.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListSort {
    #[default]
    Alphabetical,
    AlphabeticalDesc,
    CreatedDesc,
    CreatedAsc,
    Custom,
}

impl ListSort {
    pub const ALL: [ListSort; 5] = [
        Self::Alphabetical,
        Self::AlphabeticalDesc,
        Self::CreatedDesc,
        Self::CreatedAsc,
        Self::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alphabetical => "alphabetical",
            Self::AlphabeticalDesc => "alphabetical_desc",
            Self::CreatedDesc => "created_desc",
            Self::CreatedAsc => "created_asc",
            Self::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sort| sort.as_str() == raw)
    }

    pub fn valid_options() -> String {
        join_options(Self::ALL.iter().map(|sort| sort.as_str()))
    }
}

fn join_options<'a>(options: impl Iterator<Item = &'a str>) -> String {
    options.collect::<Vec<_>>().join(", ")
}

/// Primary kind of a state change, before undo tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    ListCreated,
    ItemCreated,
    ItemEdited,
    ItemCompleted,
    ItemUncompleted,
    ItemDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    ListCreated,
    ItemCreated,
    ItemEdited,
    ItemCompleted,
    ItemUncompleted,
    ItemDeleted,
    UndoCreated,
    UndoDeleted,
    UndoEdited,
    UndoCompleted,
    UndoUncompleted,
}

impl HistoryAction {
    pub const ALL: [HistoryAction; 11] = [
        Self::ListCreated,
        Self::ItemCreated,
        Self::ItemEdited,
        Self::ItemCompleted,
        Self::ItemUncompleted,
        Self::ItemDeleted,
        Self::UndoCreated,
        Self::UndoDeleted,
        Self::UndoEdited,
        Self::UndoCompleted,
        Self::UndoUncompleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListCreated => "list_created",
            Self::ItemCreated => "item_created",
            Self::ItemEdited => "item_edited",
            Self::ItemCompleted => "item_completed",
            Self::ItemUncompleted => "item_uncompleted",
            Self::ItemDeleted => "item_deleted",
            Self::UndoCreated => "undo_created",
            Self::UndoDeleted => "undo_deleted",
            Self::UndoEdited => "undo_edited",
            Self::UndoCompleted => "undo_completed",
            Self::UndoUncompleted => "undo_uncompleted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == raw)
    }

    pub fn is_undo(self) -> bool {
        matches!(
            self,
            Self::UndoCreated
                | Self::UndoDeleted
                | Self::UndoEdited
                | Self::UndoCompleted
                | Self::UndoUncompleted
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListRecord {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub item_sort: ItemSort,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// A list row as the overview screen shows it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListSummary {
    #[serde(flatten)]
    pub list: ListRecord,
    pub total_items: i64,
    pub completed_items: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRecord {
    pub id: i64,
    pub list_id: i64,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub list_id: i64,
    pub item_id: Option<i64>,
    pub action: HistoryAction,
    pub item_text: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub item_current_completed: Option<bool>,
    pub item_current_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListPayload {
    pub name: String,
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_icon() -> String {
    DEFAULT_LIST_ICON.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateListPayload {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub item_sort: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderListsPayload {
    pub list_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemPayload {
    pub text: String,
    #[serde(default)]
    pub undo: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateItemPayload {
    pub text: Option<String>,
    pub completed: Option<bool>,
    #[serde(default)]
    pub undo: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdatePayload {
    pub list_sort: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListItemsQuery {
    #[serde(default)]
    pub include_completed: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeleteItemQuery {
    #[serde(default)]
    pub undo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedListResponse {
    pub id: i64,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedItemResponse {
    pub id: i64,
    pub list_id: i64,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    ListsChanged,
    ItemsChanged,
}

/// Payload pushed to live-update subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub list_id: Option<i64>,
}

impl ChangeEvent {
    pub fn lists_changed(list_id: Option<i64>) -> Self {
        Self {
            kind: ChangeKind::ListsChanged,
            list_id,
        }
    }

    pub fn items_changed(list_id: i64) -> Self {
        Self {
            kind: ChangeKind::ItemsChanged,
            list_id: Some(list_id),
        }
    }
}
