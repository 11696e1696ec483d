//! Work item model and the source seam for querying a work tracker.
//!
//! This module defines the `WorkItem` struct shared across the roadmap
//! pipeline, the filter used to query items, and the `WorkItemSource` trait
//! that abstracts the backing tracker (a local board file, or anything that
//! can answer the same questions).

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-bag key carrying an explicit parent work item id.
pub const FIELD_PARENT: &str = "Parent";

/// Field-bag key carrying an optional start date (`YYYY-MM-DD`).
pub const FIELD_START_DATE: &str = "StartDate";

/// Coarse bucket grouping a process's specific state names.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum StateCategory {
    Proposed,
    InProgress,
    Completed,
    Removed,
    #[default]
    Unknown,
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateCategory::Proposed => "Proposed",
            StateCategory::InProgress => "InProgress",
            StateCategory::Completed => "Completed",
            StateCategory::Removed => "Removed",
            StateCategory::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Derive the state category for a state name.
///
/// Unrecognised names map to `Unknown` rather than failing; processes are
/// free to define custom states.
pub fn state_category(state: &str) -> StateCategory {
    match state.trim().to_lowercase().as_str() {
        "new" | "proposed" | "to do" | "open" => StateCategory::Proposed,
        "active" | "in progress" | "committed" | "doing" | "approved" => StateCategory::InProgress,
        "done" | "closed" | "resolved" | "completed" => StateCategory::Completed,
        "removed" | "rejected" | "abandoned" => StateCategory::Removed,
        _ => StateCategory::Unknown,
    }
}

/// A work item with the properties the roadmap needs promoted to fields.
///
/// Less common attributes (explicit parent id, start date) live in the
/// free-form `fields` bag instead of first-class properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    pub title: String,
    pub work_item_type: String,
    pub state: String,
    /// Derived from `state` on load, never persisted.
    #[serde(skip)]
    pub state_category: StateCategory,
    #[serde(default)]
    pub assigned_to: String,
    pub target_date: Option<NaiveDate>,
    pub modified: NaiveDate,
    #[serde(default)]
    pub iteration_path: String,
    #[serde(default)]
    pub area_path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Display color, filled from the board's type summaries on load.
    #[serde(skip)]
    pub color: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl WorkItem {
    /// Read an integer field from the bag, tolerating string-encoded numbers.
    pub fn field_i64(&self, key: &str) -> Option<i64> {
        match self.fields.get(key)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read a `YYYY-MM-DD` date field from the bag. An unparseable value
    /// yields `None`, not an error.
    pub fn field_date(&self, key: &str) -> Option<NaiveDate> {
        let value = self.fields.get(key)?.as_str()?;
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
    }
}

/// Summary of a work item type as configured for a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemTypeSummary {
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// One state definition of a process, scoped to a work item type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDefinition {
    pub work_item_type: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    pub category: StateCategory,
    #[serde(default)]
    pub order: i32,
}

/// Filter parameters for work item queries.
#[derive(Debug, Clone)]
pub struct WorkItemFilter {
    pub project: String,
    pub work_item_types: Vec<String>,
    pub state_categories: Vec<StateCategory>,
    pub states: Vec<String>,
    pub assigned_to: Option<String>,
    pub iteration_under: Option<String>,
    pub area_under: Option<String>,
    pub modified_since: Option<NaiveDate>,
    /// Result cap; queries return the most recently modified items first.
    pub top: usize,
}

impl Default for WorkItemFilter {
    fn default() -> Self {
        WorkItemFilter {
            project: String::new(),
            work_item_types: Vec::new(),
            state_categories: Vec::new(),
            states: Vec::new(),
            assigned_to: None,
            iteration_under: None,
            area_under: None,
            modified_since: None,
            top: 200,
        }
    }
}

/// Errors surfaced by a work item source or the settings store.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Seam to the backing work tracker.
///
/// Reads feed the roadmap pipeline; the two update methods are the write-back
/// path for re-scheduling and state changes. Calls are issued sequentially,
/// one at a time; implementations are free to block on I/O internally.
pub trait WorkItemSource {
    /// Work items matching the filter, most recently modified first.
    fn work_items(&self, filter: &WorkItemFilter) -> Result<Vec<WorkItem>, SourceError>;

    /// Parent id to child ids, keyed on forward hierarchy links of the given
    /// items. Parents with no linked children are omitted.
    fn relationships(&self, ids: &[i64]) -> Result<BTreeMap<i64, Vec<i64>>, SourceError>;

    /// Set or clear a work item's target date. `Ok(false)` means the item
    /// was not found.
    fn update_target_date(
        &mut self,
        id: i64,
        target_date: Option<NaiveDate>,
    ) -> Result<bool, SourceError>;

    /// Move a work item to a new state. `Ok(false)` means the item was not
    /// found.
    fn update_state(&mut self, id: i64, state: &str) -> Result<bool, SourceError>;

    /// Raw state definitions for a process, one entry per (type, state).
    fn state_definitions(&self, process_id: &str) -> Result<Vec<StateDefinition>, SourceError>;
}

/// Case-insensitive membership test for type-name lists.
pub fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Collapse a failed collaborator call into empty data at the boundary.
///
/// The roadmap view renders with missing sections instead of failing, so
/// every read along the render path funnels through here: errors are logged
/// and replaced by the type's default.
pub fn degrade_to_empty<T, E>(operation: &str, result: Result<T, E>) -> T
where
    T: Default,
    E: fmt::Display,
{
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("{operation} failed, rendering empty: {err}");
            T::default()
        }
    }
}
