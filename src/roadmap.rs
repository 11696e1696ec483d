//! Roadmap projection: swimlane tree assembly and timeline positioning.
//!
//! The pipeline runs one direction: resolved hierarchy type lists select the
//! work items, forward hierarchy links shape them into a three-level tree
//! (top grouping, parent grouping, leaf rows), and each leaf's target date
//! maps to a percentage-based left/width pair on the configured date axis.
//! User edits write a new target date or state back through the source and
//! re-trigger the same pipeline.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Local, Months, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::hierarchy::{roadmap_hierarchy_levels, work_item_type_levels};
use crate::settings::{
    SettingsError, SettingsStore, KEY_ROADMAP_END, KEY_ROADMAP_START, KEY_ROADMAP_TIME_UNIT,
};
use crate::workitem::{
    contains_ignore_case, degrade_to_empty, StateCategory, WorkItem, WorkItemFilter,
    WorkItemSource, FIELD_PARENT, FIELD_START_DATE,
};

/// Granularity of the timeline axis; also sets the default bar width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum TimeUnit {
    #[default]
    Day,
    Week,
    Month,
    Quarter,
}

impl TimeUnit {
    /// Linear day count for one unit. Months and quarters are approximate,
    /// not calendar-aware.
    pub fn days(self) -> f64 {
        match self {
            TimeUnit::Day => 1.0,
            TimeUnit::Week => 7.0,
            TimeUnit::Month => 30.0,
            TimeUnit::Quarter => 90.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeUnit::Day => "Day",
            TimeUnit::Week => "Week",
            TimeUnit::Month => "Month",
            TimeUnit::Quarter => "Quarter",
        }
    }

    /// Parse a stored unit name leniently; anything unrecognised falls back
    /// to the default variant.
    pub fn parse(name: &str) -> TimeUnit {
        match name.trim().to_lowercase().as_str() {
            "day" => TimeUnit::Day,
            "week" => TimeUnit::Week,
            "month" => TimeUnit::Month,
            "quarter" => TimeUnit::Quarter,
            _ => TimeUnit::default(),
        }
    }
}

/// Roadmap display configuration, persisted as discrete settings keys.
#[derive(Debug, Clone, Serialize)]
pub struct RoadmapConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub time_unit: TimeUnit,
    pub zoom_level: u32,
    pub show_dependencies: bool,
    pub show_related: bool,
    pub visible_work_item_types: Vec<String>,
}

impl RoadmapConfig {
    /// Default one-year window around `today`.
    pub fn default_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = today.checked_sub_months(Months::new(1)).unwrap_or(today);
        let end = today.checked_add_months(Months::new(11)).unwrap_or(today);
        (start, end)
    }
}

impl Default for RoadmapConfig {
    fn default() -> Self {
        let (start_date, end_date) = RoadmapConfig::default_range(Local::now().date_naive());
        RoadmapConfig {
            start_date,
            end_date,
            time_unit: TimeUnit::Week,
            zoom_level: 1,
            show_dependencies: true,
            show_related: true,
            visible_work_item_types: Vec::new(),
        }
    }
}

/// One row grouping of the roadmap: a node of the three-level tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwimLane {
    pub work_item_id: i64,
    pub title: String,
    pub work_item_type: String,
    pub color: String,
    pub is_collapsed: bool,
    /// Nesting depth: 0 = top grouping, 1 = parent grouping, 2 = leaf row.
    pub level: i32,
    pub children: Vec<SwimLane>,
    /// Only leaf lanes carry items, exactly one each.
    pub timeline_items: Vec<TimelineItem>,
}

/// A leaf work item projected onto the date axis.
///
/// `left_position` and `width` are meaningless until
/// [`calculate_timeline_positions`] has run against a fixed range; until
/// then they stay at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineItem {
    pub work_item_id: i64,
    pub title: String,
    pub work_item_type: String,
    pub color: String,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub state: String,
    pub state_category: StateCategory,
    pub parent_id: Option<i64>,
    pub parent_title: String,
    pub parent_type: String,
    pub assigned_to: String,
    pub left_position: f64,
    pub width: f64,
    pub swim_lane_level: i32,
}

/// A leaf item kept off the timeline: no target date and not yet completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnscheduledWorkItem {
    pub work_item_id: i64,
    pub title: String,
    pub work_item_type: String,
    pub color: String,
    pub state: String,
    pub state_category: StateCategory,
    pub parent_id: Option<i64>,
    pub parent_title: String,
    pub parent_type: String,
    pub assigned_to: String,
}

/// Load the roadmap configuration, applying defaults for missing keys.
///
/// Stored dates that no longer parse fall back to the computed defaults; a
/// stored unit name that no longer parses falls back to the default unit.
pub fn load_config(settings: &mut impl SettingsStore) -> RoadmapConfig {
    let today = Local::now().date_naive();
    let (default_start, default_end) = RoadmapConfig::default_range(today);

    let start_date = read_date_setting(settings, KEY_ROADMAP_START, default_start);
    let end_date = read_date_setting(settings, KEY_ROADMAP_END, default_end);
    let unit_name = degrade_or(
        settings.get_or_create(KEY_ROADMAP_TIME_UNIT, TimeUnit::Week.name()),
        KEY_ROADMAP_TIME_UNIT,
        TimeUnit::Week.name().to_string(),
    );

    RoadmapConfig {
        start_date,
        end_date,
        time_unit: TimeUnit::parse(&unit_name),
        ..RoadmapConfig::default()
    }
}

fn read_date_setting(
    settings: &mut impl SettingsStore,
    key: &str,
    default: NaiveDate,
) -> NaiveDate {
    let stored = degrade_or(
        settings.get_or_create(key, &default.format("%Y-%m-%d").to_string()),
        key,
        String::new(),
    );
    NaiveDate::parse_from_str(&stored, "%Y-%m-%d").unwrap_or(default)
}

fn degrade_or(result: Result<String, SettingsError>, key: &str, fallback: String) -> String {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("reading setting {key} failed, using default: {err}");
            fallback
        }
    }
}

/// Persist the roadmap configuration keys.
pub fn save_config(
    settings: &mut impl SettingsStore,
    config: &RoadmapConfig,
) -> Result<(), SettingsError> {
    settings.set(
        KEY_ROADMAP_START,
        &config.start_date.format("%Y-%m-%d").to_string(),
    )?;
    settings.set(
        KEY_ROADMAP_END,
        &config.end_date.format("%Y-%m-%d").to_string(),
    )?;
    settings.set(KEY_ROADMAP_TIME_UNIT, config.time_unit.name())?;
    Ok(())
}

/// Load the work items feeding the roadmap view.
///
/// Queries the distinct union of all roadmap-level type names across the
/// Proposed, InProgress and Completed categories. An unconfigured hierarchy
/// or a failing source yields an empty list, never an error.
pub fn load_roadmap_work_items(
    settings: &mut impl SettingsStore,
    source: &impl WorkItemSource,
    process_id: &str,
    project_id: &str,
) -> Vec<WorkItem> {
    let levels = roadmap_hierarchy_levels(settings, process_id);
    if levels.is_empty() {
        return Vec::new();
    }

    let mut work_item_types: Vec<String> = Vec::new();
    for level in &levels {
        for name in &level.work_item_types {
            if !contains_ignore_case(&work_item_types, name) {
                work_item_types.push(name.clone());
            }
        }
    }

    let filter = WorkItemFilter {
        project: project_id.to_string(),
        work_item_types,
        state_categories: vec![
            StateCategory::Proposed,
            StateCategory::InProgress,
            StateCategory::Completed,
        ],
        top: 1000,
        ..WorkItemFilter::default()
    };
    degrade_to_empty("loading roadmap work items", source.work_items(&filter))
}

/// Build the swimlane tree for a process's roadmap.
///
/// Resolves the type levels, fetches the parent/child link map (degrading to
/// an empty map when the lookup fails, rather than guessing relationships),
/// and assembles the tree.
pub fn roadmap_swimlanes(
    settings: &mut impl SettingsStore,
    source: &impl WorkItemSource,
    process_id: &str,
    work_items: &[WorkItem],
) -> Vec<SwimLane> {
    let (top, parent, lowest) = work_item_type_levels(settings, process_id);
    tracing::info!(
        top = %top.join(","),
        parent = %parent.join(","),
        lowest = %lowest.join(","),
        "building swimlanes"
    );

    let ids: Vec<i64> = work_items.iter().map(|item| item.id).collect();
    let relationships = degrade_to_empty(
        "querying work item relationships",
        source.relationships(&ids),
    );
    build_swimlanes(work_items, &relationships, &top, &parent, &lowest)
}

/// Assemble the three-level swimlane tree from flat items and a parent to
/// children id map.
///
/// Top and parent groupings with no matching children still produce a lane
/// with an empty child list, so they render as an empty row instead of
/// silently disappearing. Siblings are ordered by title at every level.
pub fn build_swimlanes(
    work_items: &[WorkItem],
    relationships: &BTreeMap<i64, Vec<i64>>,
    top_types: &[String],
    parent_types: &[String],
    lowest_types: &[String],
) -> Vec<SwimLane> {
    let lookup: HashMap<i64, &WorkItem> =
        work_items.iter().map(|item| (item.id, item)).collect();

    let mut top_items: Vec<&WorkItem> = work_items
        .iter()
        .filter(|item| contains_ignore_case(top_types, &item.work_item_type))
        .collect();
    top_items.sort_by(|a, b| a.title.cmp(&b.title));

    let mut swimlanes = Vec::new();
    for top_item in top_items {
        let mut parent_items: Vec<&WorkItem> = children_of(top_item.id, relationships, &lookup)
            .filter(|item| contains_ignore_case(parent_types, &item.work_item_type))
            .collect();
        parent_items.sort_by(|a, b| a.title.cmp(&b.title));

        let mut parent_lanes = Vec::new();
        for parent_item in parent_items {
            let mut leaf_items: Vec<&WorkItem> =
                children_of(parent_item.id, relationships, &lookup)
                    .filter(|item| contains_ignore_case(lowest_types, &item.work_item_type))
                    .collect();
            leaf_items.sort_by(|a, b| a.title.cmp(&b.title));

            // One lane per leaf item, each carrying exactly one timeline item.
            let leaf_lanes: Vec<SwimLane> = leaf_items
                .into_iter()
                .map(|leaf| SwimLane {
                    work_item_id: leaf.id,
                    title: leaf.title.clone(),
                    work_item_type: leaf.work_item_type.clone(),
                    color: leaf.color.clone(),
                    is_collapsed: false,
                    level: 2,
                    children: Vec::new(),
                    timeline_items: vec![to_timeline_item(leaf, Some(parent_item))],
                })
                .collect();

            parent_lanes.push(SwimLane {
                work_item_id: parent_item.id,
                title: parent_item.title.clone(),
                work_item_type: parent_item.work_item_type.clone(),
                color: parent_item.color.clone(),
                is_collapsed: false,
                level: 1,
                children: leaf_lanes,
                timeline_items: Vec::new(),
            });
        }

        swimlanes.push(SwimLane {
            work_item_id: top_item.id,
            title: top_item.title.clone(),
            work_item_type: top_item.work_item_type.clone(),
            color: top_item.color.clone(),
            is_collapsed: false,
            level: 0,
            children: parent_lanes,
            timeline_items: Vec::new(),
        });
    }
    swimlanes
}

fn children_of<'a>(
    parent_id: i64,
    relationships: &'a BTreeMap<i64, Vec<i64>>,
    lookup: &'a HashMap<i64, &'a WorkItem>,
) -> impl Iterator<Item = &'a WorkItem> + 'a {
    relationships
        .get(&parent_id)
        .map(|ids| ids.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(move |id| lookup.get(id).copied())
}

fn to_timeline_item(item: &WorkItem, parent: Option<&WorkItem>) -> TimelineItem {
    TimelineItem {
        work_item_id: item.id,
        title: item.title.clone(),
        work_item_type: item.work_item_type.clone(),
        color: item.color.clone(),
        start_date: item.field_date(FIELD_START_DATE),
        target_date: item.target_date,
        end_date: None,
        state: item.state.clone(),
        state_category: item.state_category,
        parent_id: parent.map(|p| p.id),
        parent_title: parent.map(|p| p.title.clone()).unwrap_or_default(),
        parent_type: parent.map(|p| p.work_item_type.clone()).unwrap_or_default(),
        assigned_to: item.assigned_to.clone(),
        left_position: 0.0,
        width: 0.0,
        swim_lane_level: 2,
    }
}

/// Leaf-type items that belong in the backlog panel instead of the timeline:
/// no target date and not in a Completed state category.
///
/// Parent display fields prefer the item's explicit parent field; otherwise
/// the first other item of a parent-level type sharing both area and
/// iteration path is taken. That path match is a best-effort fallback and
/// may mis-attribute when several parents share the same paths.
pub fn unscheduled_work_items(
    work_items: &[WorkItem],
    lowest_types: &[String],
    parent_types: &[String],
) -> Vec<UnscheduledWorkItem> {
    let mut unscheduled: Vec<UnscheduledWorkItem> = work_items
        .iter()
        .filter(|item| {
            contains_ignore_case(lowest_types, &item.work_item_type)
                && item.target_date.is_none()
                && item.state_category != StateCategory::Completed
        })
        .map(|item| {
            let parent_id = parent_work_item_id(work_items, item, parent_types);
            let parent = parent_id.and_then(|id| work_items.iter().find(|wi| wi.id == id));
            UnscheduledWorkItem {
                work_item_id: item.id,
                title: item.title.clone(),
                work_item_type: item.work_item_type.clone(),
                color: item.color.clone(),
                state: item.state.clone(),
                state_category: item.state_category,
                parent_id,
                parent_title: parent.map(|p| p.title.clone()).unwrap_or_default(),
                parent_type: parent.map(|p| p.work_item_type.clone()).unwrap_or_default(),
                assigned_to: item.assigned_to.clone(),
            }
        })
        .collect();
    unscheduled.sort_by(|a, b| {
        a.parent_title
            .cmp(&b.parent_title)
            .then_with(|| a.title.cmp(&b.title))
    });
    unscheduled
}

fn parent_work_item_id(
    work_items: &[WorkItem],
    item: &WorkItem,
    parent_types: &[String],
) -> Option<i64> {
    if let Some(parent_id) = item.field_i64(FIELD_PARENT) {
        return Some(parent_id);
    }
    work_items
        .iter()
        .find(|candidate| {
            candidate.id != item.id
                && contains_ignore_case(parent_types, &candidate.work_item_type)
                && candidate.area_path == item.area_path
                && candidate.iteration_path == item.iteration_path
        })
        .map(|candidate| candidate.id)
}

/// Project each item's target date onto the percentage axis.
///
/// Pure: touches only the two computed fields. Items without a target date
/// are skipped. Left positions are not clamped, so a target outside the
/// range lands off-canvas (negative or past 100). Width is the unit's day
/// count as a fraction of the span, floored at 0.5 so bars stay visible at
/// short ranges. A non-positive span returns the input unchanged.
pub fn calculate_timeline_positions(
    mut items: Vec<TimelineItem>,
    config: &RoadmapConfig,
) -> Vec<TimelineItem> {
    let total_days = (config.end_date - config.start_date).num_days() as f64;
    if total_days <= 0.0 {
        tracing::warn!(
            "timeline range {} to {} has no span, leaving positions untouched",
            config.start_date,
            config.end_date
        );
        return items;
    }

    for item in &mut items {
        let Some(target_date) = item.target_date else {
            continue;
        };
        let days_from_start = (target_date - config.start_date).num_days() as f64;
        item.left_position = days_from_start / total_days * 100.0;
        item.width = (config.time_unit.days() / total_days * 100.0).max(0.5);
    }
    items
}

/// Position every timeline item in a lane tree.
pub fn position_swimlanes(lanes: &mut [SwimLane], config: &RoadmapConfig) {
    for lane in lanes {
        let items = std::mem::take(&mut lane.timeline_items);
        lane.timeline_items = calculate_timeline_positions(items, config);
        position_swimlanes(&mut lane.children, config);
    }
}

/// Invert the axis: the date under a percentage position.
///
/// Positions are clamped to the axis before conversion. `None` when the
/// configured range has no span.
pub fn date_at_position(percent: f64, config: &RoadmapConfig) -> Option<NaiveDate> {
    let total_days = (config.end_date - config.start_date).num_days();
    if total_days <= 0 {
        return None;
    }
    let clamped = percent.clamp(0.0, 100.0);
    let offset = (clamped / 100.0 * total_days as f64).round() as i64;
    config.start_date.checked_add_signed(Duration::days(offset))
}

/// Write a new target date (or clear it) for a work item.
///
/// Returns whether the update took effect; failures are logged, never
/// propagated.
pub fn update_work_item_target_date(
    source: &mut impl WorkItemSource,
    id: i64,
    target_date: Option<NaiveDate>,
) -> bool {
    match source.update_target_date(id, target_date) {
        Ok(true) => {
            tracing::info!(
                "updated work item {id} target date to {}",
                target_date.map_or_else(|| "none".to_string(), |d| d.to_string())
            );
            true
        }
        Ok(false) => {
            tracing::warn!("work item {id} not found for target date update");
            false
        }
        Err(err) => {
            tracing::warn!("updating work item {id} target date failed: {err}");
            false
        }
    }
}

/// Move a work item to a new state. Same contract as the date update.
pub fn update_work_item_state(source: &mut impl WorkItemSource, id: i64, state: &str) -> bool {
    match source.update_state(id, state) {
        Ok(true) => {
            tracing::info!("updated work item {id} state to {state}");
            true
        }
        Ok(false) => {
            tracing::warn!("work item {id} not found for state update");
            false
        }
        Err(err) => {
            tracing::warn!("updating work item {id} state failed: {err}");
            false
        }
    }
}
