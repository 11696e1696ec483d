//! End-to-end run of the roadmap pipeline against real files: persisted
//! hierarchy and config through the resolver, query, swimlane build and
//! positioning.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tempfile::TempDir;

use workboard::board::{Board, HierarchyLink, JsonBoard};
use workboard::hierarchy::{serialize_hierarchy, work_item_type_levels, HierarchyLevel};
use workboard::roadmap::{
    load_config, load_roadmap_work_items, position_swimlanes, roadmap_swimlanes, save_config,
    unscheduled_work_items, update_work_item_target_date, RoadmapConfig, TimeUnit,
};
use workboard::settings::{
    current_process_id, current_project_id, hierarchy_key, project_key, JsonSettings,
    SettingsStore, KEY_PROCESS,
};
use workboard::workitem::{state_category, WorkItem, WorkItemTypeSummary};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn item(id: i64, wit: &str, title: &str, state: &str, target: Option<&str>) -> WorkItem {
    WorkItem {
        id,
        title: title.to_string(),
        work_item_type: wit.to_string(),
        state: state.to_string(),
        state_category: state_category(state),
        assigned_to: String::new(),
        target_date: target.map(date),
        modified: date("2024-01-02"),
        iteration_path: "Platform/2024".to_string(),
        area_path: "Platform".to_string(),
        tags: Vec::new(),
        color: String::new(),
        fields: BTreeMap::new(),
    }
}

fn level(types: &[&str]) -> HierarchyLevel {
    HierarchyLevel {
        work_item_types: types.iter().map(|s| s.to_string()).collect(),
        audience: vec!["Roadmap".to_string()],
    }
}

fn write_board(dir: &TempDir) -> std::path::PathBuf {
    let board = Board {
        process: "p1".to_string(),
        project: "platform".to_string(),
        work_item_types: vec![
            WorkItemTypeSummary {
                name: "Initiative".into(),
                color: "#339947".into(),
            },
            WorkItemTypeSummary {
                name: "Epic".into(),
                color: "#FF7B00".into(),
            },
            WorkItemTypeSummary {
                name: "Feature".into(),
                color: "#773B93".into(),
            },
        ],
        work_items: vec![
            item(1, "Initiative", "Modernise platform", "Active", None),
            item(2, "Epic", "Search", "Active", None),
            item(3, "Feature", "Indexing", "Active", Some("2024-01-06")),
            item(4, "Feature", "Query parser", "New", None),
            item(5, "Feature", "Old importer", "Done", None),
        ],
        links: vec![
            HierarchyLink { parent: 1, child: 2 },
            HierarchyLink { parent: 2, child: 3 },
        ],
        state_definitions: Vec::new(),
    };
    let path = dir.path().join("board.json");
    std::fs::write(&path, serde_json::to_string_pretty(&board).unwrap()).unwrap();
    path
}

#[test]
fn configured_pipeline_builds_and_positions_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let board = JsonBoard::open(&write_board(&dir)).unwrap();

    let mut settings = JsonSettings::open(&dir.path().join("settings.json")).unwrap();
    settings.set(KEY_PROCESS, "p1").unwrap();
    settings.set(&project_key("p1"), "platform").unwrap();
    let levels = vec![level(&["Initiative"]), level(&["Epic"]), level(&["Feature"])];
    settings
        .set(&hierarchy_key("p1"), &serialize_hierarchy(&levels).unwrap())
        .unwrap();
    save_config(
        &mut settings,
        &RoadmapConfig {
            start_date: date("2024-01-01"),
            end_date: date("2024-01-11"),
            time_unit: TimeUnit::Week,
            ..RoadmapConfig::default()
        },
    )
    .unwrap();

    let process_id = current_process_id(&mut settings).unwrap();
    let project_id = current_project_id(&mut settings, &process_id).unwrap();
    assert_eq!((process_id.as_str(), project_id.as_str()), ("p1", "platform"));

    let config = load_config(&mut settings);
    assert_eq!(config.start_date, date("2024-01-01"));
    assert_eq!(config.time_unit, TimeUnit::Week);

    let work_items = load_roadmap_work_items(&mut settings, &board, &process_id, &project_id);
    assert_eq!(work_items.len(), 5);

    let mut lanes = roadmap_swimlanes(&mut settings, &board, &process_id, &work_items);
    position_swimlanes(&mut lanes, &config);

    // One top lane (the initiative) holding one epic holding one feature row.
    assert_eq!(lanes.len(), 1);
    assert_eq!(lanes[0].work_item_id, 1);
    assert_eq!(lanes[0].children.len(), 1);
    let epic = &lanes[0].children[0];
    assert_eq!(epic.work_item_id, 2);
    assert_eq!(epic.children.len(), 1);
    let feature = &epic.children[0];
    assert_eq!(feature.work_item_id, 3);
    assert_eq!(feature.timeline_items.len(), 1);

    let bar = &feature.timeline_items[0];
    assert_eq!(bar.left_position, 50.0);
    assert_eq!(bar.width, 70.0);
    assert_eq!(bar.parent_id, Some(2));
    // Color came from the type summaries on load.
    assert_eq!(bar.color, "#773B93");

    // The open, dateless feature lands in the backlog with its parent
    // resolved by the shared-path heuristic; the completed one does not.
    let (_, parent_types, lowest_types) = work_item_type_levels(&mut settings, &process_id);
    let unscheduled = unscheduled_work_items(&work_items, &lowest_types, &parent_types);
    assert_eq!(unscheduled.len(), 1);
    assert_eq!(unscheduled[0].work_item_id, 4);
    assert_eq!(unscheduled[0].parent_id, Some(2));
    assert_eq!(unscheduled[0].parent_title, "Search");
}

#[test]
fn scheduling_moves_an_item_out_of_the_backlog() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_board(&dir);
    let mut board = JsonBoard::open(&path).unwrap();

    let lowest = vec!["Feature".to_string()];
    let parents = vec!["Epic".to_string()];
    let before = unscheduled_work_items(&board.board.work_items, &lowest, &parents);
    assert!(before.iter().any(|u| u.work_item_id == 4));

    assert!(update_work_item_target_date(&mut board, 4, Some(date("2024-01-08"))));

    // Re-running the pipeline on the persisted data sees the change.
    let reopened = JsonBoard::open(&path).unwrap();
    let after = unscheduled_work_items(&reopened.board.work_items, &lowest, &parents);
    assert!(after.iter().all(|u| u.work_item_id != 4));
    let scheduled = reopened
        .board
        .work_items
        .iter()
        .find(|i| i.id == 4)
        .unwrap();
    assert_eq!(scheduled.target_date, Some(date("2024-01-08")));
}

#[test]
fn missing_configuration_renders_empty_sections() {
    let dir = tempfile::tempdir().unwrap();
    let board = JsonBoard::open(&write_board(&dir)).unwrap();
    let mut settings = JsonSettings::open(&dir.path().join("settings.json")).unwrap();

    // No process, no hierarchy: the view degrades to empty, it never fails.
    let process_id = current_process_id(&mut settings).unwrap();
    assert_eq!(process_id, "");
    let work_items = load_roadmap_work_items(&mut settings, &board, &process_id, "");
    assert!(work_items.is_empty());
    let lanes = roadmap_swimlanes(&mut settings, &board, &process_id, &work_items);
    assert!(lanes.is_empty());
}
