//! Local board file backing the `WorkItemSource` trait.
//!
//! A board is a single JSON document holding one project's work items, the
//! forward hierarchy links between them, the configured work item types and
//! the process state definitions. Loading derives the per-item state
//! category and display color; writes go through atomic save like every
//! other file in the tool.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::hierarchy::level_color;
use crate::workitem::{
    contains_ignore_case, state_category, SourceError, StateCategory, StateDefinition, WorkItem,
    WorkItemFilter, WorkItemSource, WorkItemTypeSummary,
};

/// Fallback color for items whose type has no configured color.
const NEUTRAL_COLOR: &str = "#6C757D";

/// A forward hierarchy link: `parent` directly contains `child`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyLink {
    pub parent: i64,
    pub child: i64,
}

/// On-disk board document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub process: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub work_item_types: Vec<WorkItemTypeSummary>,
    #[serde(default)]
    pub work_items: Vec<WorkItem>,
    #[serde(default)]
    pub links: Vec<HierarchyLink>,
    #[serde(default)]
    pub state_definitions: Vec<StateDefinition>,
}

impl Board {
    /// Fill in the derived per-item fields after deserialization.
    fn normalize(&mut self) {
        let colors: BTreeMap<String, String> = self
            .work_item_types
            .iter()
            .map(|t| (t.name.to_lowercase(), t.color.clone()))
            .collect();
        for item in &mut self.work_items {
            item.state_category = state_category(&item.state);
            item.color = colors
                .get(&item.work_item_type.to_lowercase())
                .filter(|c| !c.is_empty())
                .cloned()
                .unwrap_or_else(|| NEUTRAL_COLOR.to_string());
        }
    }

    /// Starter board: the classic three-level type set and a standard state
    /// workflow per type, no items yet.
    pub fn starter(process: &str, project: &str) -> Board {
        let type_names = ["Initiative", "Epic", "Feature"];
        let work_item_types = type_names
            .iter()
            .enumerate()
            .map(|(i, name)| WorkItemTypeSummary {
                name: (*name).to_string(),
                color: level_color(i).to_string(),
            })
            .collect();
        let workflow = [
            ("New", "#b2b2b2", StateCategory::Proposed, 1),
            ("Active", "#007acc", StateCategory::InProgress, 2),
            ("Done", "#339947", StateCategory::Completed, 3),
            ("Removed", "#86cdde", StateCategory::Removed, 4),
        ];
        let state_definitions = type_names
            .iter()
            .flat_map(|name| {
                workflow.iter().map(move |(state, color, category, order)| StateDefinition {
                    work_item_type: (*name).to_string(),
                    name: (*state).to_string(),
                    color: (*color).to_string(),
                    category: *category,
                    order: *order,
                })
            })
            .collect();
        Board {
            process: process.to_string(),
            project: project.to_string(),
            work_item_types,
            work_items: Vec::new(),
            links: Vec::new(),
            state_definitions,
        }
    }
}

/// File-backed board implementing `WorkItemSource`.
#[derive(Debug)]
pub struct JsonBoard {
    path: PathBuf,
    pub board: Board,
}

impl JsonBoard {
    /// Open a board file, starting empty if it doesn't exist yet.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let mut board = if path.exists() {
            let text = fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        } else {
            Board::default()
        };
        board.normalize();
        Ok(JsonBoard {
            path: path.to_path_buf(),
            board,
        })
    }

    /// Save to disk using atomic write (temp file + rename).
    pub fn save(&self) -> Result<(), SourceError> {
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(&self.board)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }

    fn matches(&self, item: &WorkItem, filter: &WorkItemFilter) -> bool {
        if !filter.work_item_types.is_empty()
            && !contains_ignore_case(&filter.work_item_types, &item.work_item_type)
        {
            return false;
        }
        if !filter.state_categories.is_empty()
            && !filter.state_categories.contains(&item.state_category)
        {
            return false;
        }
        if !filter.states.is_empty() && !contains_ignore_case(&filter.states, &item.state) {
            return false;
        }
        if let Some(ref assignee) = filter.assigned_to {
            if assignee.eq_ignore_ascii_case("unassigned") {
                if !item.assigned_to.is_empty() {
                    return false;
                }
            } else if !item
                .assigned_to
                .to_lowercase()
                .contains(&assignee.to_lowercase())
            {
                return false;
            }
        }
        if let Some(ref root) = filter.iteration_under {
            if !path_under(&item.iteration_path, root) {
                return false;
            }
        }
        if let Some(ref root) = filter.area_under {
            if !path_under(&item.area_path, root) {
                return false;
            }
        }
        if let Some(since) = filter.modified_since {
            if item.modified < since {
                return false;
            }
        }
        true
    }
}

/// Whether `path` equals `root` or sits below it.
fn path_under(path: &str, root: &str) -> bool {
    path == root || path.starts_with(&format!("{root}/"))
}

impl WorkItemSource for JsonBoard {
    fn work_items(&self, filter: &WorkItemFilter) -> Result<Vec<WorkItem>, SourceError> {
        if !filter.project.is_empty() && !filter.project.eq_ignore_ascii_case(&self.board.project)
        {
            return Ok(Vec::new());
        }
        let mut items: Vec<WorkItem> = self
            .board
            .work_items
            .iter()
            .filter(|item| self.matches(item, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.modified.cmp(&a.modified));
        items.truncate(filter.top);
        Ok(items)
    }

    fn relationships(&self, ids: &[i64]) -> Result<BTreeMap<i64, Vec<i64>>, SourceError> {
        let mut map: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for link in &self.board.links {
            if ids.contains(&link.parent) {
                map.entry(link.parent).or_default().push(link.child);
            }
        }
        Ok(map)
    }

    fn update_target_date(
        &mut self,
        id: i64,
        target_date: Option<NaiveDate>,
    ) -> Result<bool, SourceError> {
        let today = Local::now().date_naive();
        let Some(item) = self.board.work_items.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };
        item.target_date = target_date;
        item.modified = today;
        self.save()?;
        Ok(true)
    }

    fn update_state(&mut self, id: i64, state: &str) -> Result<bool, SourceError> {
        let today = Local::now().date_naive();
        let Some(item) = self.board.work_items.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };
        item.state = state.to_string();
        item.state_category = state_category(state);
        item.modified = today;
        self.save()?;
        Ok(true)
    }

    fn state_definitions(&self, process_id: &str) -> Result<Vec<StateDefinition>, SourceError> {
        // State definitions belong to the board's process; an unknown
        // process has none.
        if process_id.is_empty() || process_id == self.board.process {
            Ok(self.board.state_definitions.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, wit: &str, state: &str, modified: &str) -> WorkItem {
        WorkItem {
            id,
            title: format!("item {id}"),
            work_item_type: wit.to_string(),
            state: state.to_string(),
            state_category: state_category(state),
            assigned_to: String::new(),
            target_date: None,
            modified: NaiveDate::parse_from_str(modified, "%Y-%m-%d").unwrap(),
            iteration_path: "Alpha/Sprint 1".to_string(),
            area_path: "Alpha/Web".to_string(),
            tags: Vec::new(),
            color: String::new(),
            fields: BTreeMap::new(),
        }
    }

    fn board_with(items: Vec<WorkItem>, links: Vec<HierarchyLink>) -> JsonBoard {
        let dir = std::env::temp_dir().join("workboard-test-unused");
        JsonBoard {
            path: dir,
            board: Board {
                process: "p1".into(),
                project: "alpha".into(),
                work_items: items,
                links,
                ..Board::default()
            },
        }
    }

    #[test]
    fn filters_compose_and_cap_applies() {
        let board = board_with(
            vec![
                item(1, "Epic", "New", "2024-02-01"),
                item(2, "Feature", "Active", "2024-02-03"),
                item(3, "Feature", "Done", "2024-02-02"),
                item(4, "Feature", "Active", "2024-01-10"),
            ],
            Vec::new(),
        );

        let filter = WorkItemFilter {
            work_item_types: vec!["feature".into()],
            state_categories: vec![StateCategory::InProgress],
            ..WorkItemFilter::default()
        };
        let found = board.work_items(&filter).unwrap();
        assert_eq!(found.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2, 4]);

        // Most recently modified first, then the cap.
        let capped = board
            .work_items(&WorkItemFilter {
                top: 2,
                ..WorkItemFilter::default()
            })
            .unwrap();
        assert_eq!(capped.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2, 3]);

        let since = board
            .work_items(&WorkItemFilter {
                modified_since: NaiveDate::from_ymd_opt(2024, 2, 2),
                ..WorkItemFilter::default()
            })
            .unwrap();
        assert_eq!(since.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn area_filter_matches_whole_segments() {
        let board = board_with(vec![item(1, "Epic", "New", "2024-02-01")], Vec::new());
        let hit = WorkItemFilter {
            area_under: Some("Alpha".into()),
            ..WorkItemFilter::default()
        };
        assert_eq!(board.work_items(&hit).unwrap().len(), 1);
        // "Alph" is not a path segment prefix.
        let miss = WorkItemFilter {
            area_under: Some("Alph".into()),
            ..WorkItemFilter::default()
        };
        assert!(board.work_items(&miss).unwrap().is_empty());
    }

    #[test]
    fn unmatched_project_yields_nothing() {
        let board = board_with(vec![item(1, "Epic", "New", "2024-02-01")], Vec::new());
        let filter = WorkItemFilter {
            project: "other".into(),
            ..WorkItemFilter::default()
        };
        assert!(board.work_items(&filter).unwrap().is_empty());
    }

    #[test]
    fn relationships_only_cover_requested_parents() {
        let board = board_with(
            Vec::new(),
            vec![
                HierarchyLink { parent: 1, child: 2 },
                HierarchyLink { parent: 1, child: 3 },
                HierarchyLink { parent: 9, child: 4 },
            ],
        );
        let map = board.relationships(&[1, 2, 3]).unwrap();
        assert_eq!(map.get(&1), Some(&vec![2, 3]));
        assert!(!map.contains_key(&9));
    }

    #[test]
    fn updates_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        let mut board = JsonBoard {
            path: path.clone(),
            board: Board {
                process: "p1".into(),
                project: "alpha".into(),
                work_items: vec![item(5, "Feature", "New", "2024-02-01")],
                ..Board::default()
            },
        };
        board.save().unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 6, 1);
        assert!(board.update_target_date(5, date).unwrap());
        assert!(board.update_state(5, "Active").unwrap());
        assert!(!board.update_state(404, "Active").unwrap());

        let reopened = JsonBoard::open(&path).unwrap();
        let item = &reopened.board.work_items[0];
        assert_eq!(item.target_date, date);
        assert_eq!(item.state, "Active");
        assert_eq!(item.state_category, StateCategory::InProgress);
    }

    #[test]
    fn load_derives_category_and_color() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        let mut board = Board::starter("p1", "alpha");
        board.work_items.push(item(1, "Epic", "Done", "2024-02-01"));
        board.work_items.push(item(2, "Mystery", "New", "2024-02-01"));
        JsonBoard { path: path.clone(), board }.save().unwrap();

        let reopened = JsonBoard::open(&path).unwrap();
        let epic = &reopened.board.work_items[0];
        assert_eq!(epic.state_category, StateCategory::Completed);
        assert_eq!(epic.color, level_color(1));
        // No configured color for the unknown type.
        assert_eq!(reopened.board.work_items[1].color, NEUTRAL_COLOR);
    }
}
