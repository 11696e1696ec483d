//! Type hierarchy configuration and the roadmap hierarchy resolver.
//!
//! Users arrange work item types into ordered levels (index 0 is the topmost
//! grouping, the last index the leaf level) and tag each level with the
//! audiences that should use it (Roadmap, Planning, Building). The list is
//! persisted as JSON under a per-process settings key and replaced wholesale
//! on every edit, never mutated in place.

use serde::{Deserialize, Serialize};

use crate::settings::{hierarchy_key, SettingsStore};
use crate::workitem::WorkItemTypeSummary;

/// Audience tag selecting a level for the roadmap view.
pub const AUDIENCE_ROADMAP: &str = "Roadmap";

/// Colors assigned to hierarchy levels, repeating past the palette end.
const LEVEL_COLORS: [&str; 7] = [
    "#339947", "#FF7B00", "#773B93", "#009CCC", "#F2CB1D", "#F599D1", "#E60017",
];

/// Display color for a zero-based hierarchy level index.
pub fn level_color(level: usize) -> &'static str {
    LEVEL_COLORS[level % LEVEL_COLORS.len()]
}

/// One ordered group in the type hierarchy.
///
/// Serialized key names are fixed by the stored format and must not change:
/// settings written by earlier releases still use them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    #[serde(rename = "WorkItemTypes")]
    pub work_item_types: Vec<String>,
    #[serde(rename = "Audience", default)]
    pub audience: Vec<String>,
}

impl HierarchyLevel {
    /// Whether this level is tagged for an audience, case-insensitively.
    pub fn has_audience(&self, audience: &str) -> bool {
        self.audience.iter().any(|a| a.eq_ignore_ascii_case(audience))
    }
}

/// Result of parsing the persisted hierarchy text.
///
/// The stored value is either the current shape (a list of levels with
/// audiences) or the legacy shape that predates audiences (a bare list of
/// type-name lists). `Absent` stands for "no configuration": empty text,
/// the `"[]"` placeholder, or text neither shape accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredHierarchy {
    Levels(Vec<HierarchyLevel>),
    Legacy(Vec<Vec<String>>),
    Absent,
}

impl StoredHierarchy {
    /// Parse persisted hierarchy JSON, trying the current shape first and
    /// falling back to the legacy shape.
    pub fn parse(json: &str) -> StoredHierarchy {
        let json = json.trim();
        if json.is_empty() || json == "[]" {
            return StoredHierarchy::Absent;
        }
        if let Ok(levels) = serde_json::from_str::<Vec<HierarchyLevel>>(json) {
            return StoredHierarchy::Levels(levels);
        }
        if let Ok(legacy) = serde_json::from_str::<Vec<Vec<String>>>(json) {
            return StoredHierarchy::Legacy(legacy);
        }
        StoredHierarchy::Absent
    }

    /// Levels in the current shape, upgrading legacy data to levels with an
    /// empty audience set. `None` means no configuration.
    pub fn levels(self) -> Option<Vec<HierarchyLevel>> {
        match self {
            StoredHierarchy::Levels(levels) => Some(levels),
            StoredHierarchy::Legacy(levels) => Some(
                levels
                    .into_iter()
                    .map(|work_item_types| HierarchyLevel {
                        work_item_types,
                        audience: Vec::new(),
                    })
                    .collect(),
            ),
            StoredHierarchy::Absent => None,
        }
    }
}

/// Serialize levels to the current stored format.
pub fn serialize_hierarchy(levels: &[HierarchyLevel]) -> Result<String, serde_json::Error> {
    serde_json::to_string(levels)
}

/// Load all configured hierarchy levels for a process.
///
/// `None` means no configuration; store or parse failures are logged and
/// treated the same way so the caller renders an empty view.
pub fn load_hierarchy_levels(
    settings: &mut impl SettingsStore,
    process_id: &str,
) -> Option<Vec<HierarchyLevel>> {
    let key = hierarchy_key(process_id);
    match settings.get_or_create(&key, "[]") {
        Ok(json) => StoredHierarchy::parse(&json).levels(),
        Err(err) => {
            tracing::warn!("loading hierarchy for process {process_id} failed: {err}");
            None
        }
    }
}

/// Hierarchy levels tagged for the roadmap audience, in configured order.
///
/// Never fails: a missing or unreadable configuration yields an empty list.
pub fn roadmap_hierarchy_levels(
    settings: &mut impl SettingsStore,
    process_id: &str,
) -> Vec<HierarchyLevel> {
    load_hierarchy_levels(settings, process_id)
        .map(|levels| {
            levels
                .into_iter()
                .filter(|level| level.has_audience(AUDIENCE_ROADMAP))
                .collect()
        })
        .unwrap_or_default()
}

/// Type names of the topmost grouping level, empty when unconfigured.
pub fn top_level_types(levels: &[HierarchyLevel]) -> Vec<String> {
    levels
        .first()
        .map(|level| level.work_item_types.clone())
        .unwrap_or_default()
}

/// Type names of the second-to-last level.
///
/// With fewer than two levels there is no distinct parent level and the
/// result is empty; callers must tolerate the one-level degenerate shape
/// where top and lowest overlap.
pub fn parent_level_types(levels: &[HierarchyLevel]) -> Vec<String> {
    if levels.len() < 2 {
        return Vec::new();
    }
    levels[levels.len() - 2].work_item_types.clone()
}

/// Type names of the leaf level, empty when unconfigured.
pub fn lowest_level_types(levels: &[HierarchyLevel]) -> Vec<String> {
    levels
        .last()
        .map(|level| level.work_item_types.clone())
        .unwrap_or_default()
}

/// The `(top, parent, lowest)` type-name triple for a process's roadmap.
pub fn work_item_type_levels(
    settings: &mut impl SettingsStore,
    process_id: &str,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let levels = roadmap_hierarchy_levels(settings, process_id);
    (
        top_level_types(&levels),
        parent_level_types(&levels),
        lowest_level_types(&levels),
    )
}

/// Resolve level type names against the types actually available, dropping
/// names that no longer exist and levels left empty by that.
pub fn resolve_levels(
    levels: &[HierarchyLevel],
    available: &[WorkItemTypeSummary],
) -> Vec<Vec<WorkItemTypeSummary>> {
    let mut resolved = Vec::new();
    for level in levels {
        let summaries: Vec<WorkItemTypeSummary> = level
            .work_item_types
            .iter()
            .filter_map(|name| available.iter().find(|t| &t.name == name).cloned())
            .collect();
        if !summaries.is_empty() {
            resolved.push(summaries);
        }
    }
    resolved
}
