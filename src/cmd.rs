//! Command implementations for the CLI interface.
//!
//! This module contains the command handlers tying the roadmap pipeline to
//! the terminal: rendering the swimlane tree and backlog, editing the
//! persisted hierarchy and display range, and the target-date/state
//! write-back commands.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDate};
use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;

use crate::board::{Board, JsonBoard};
use crate::cli::Cli;
use crate::hierarchy::{
    level_color, load_hierarchy_levels, resolve_levels, serialize_hierarchy,
    work_item_type_levels, StoredHierarchy, AUDIENCE_ROADMAP,
};
use crate::roadmap::{
    date_at_position, load_config, load_roadmap_work_items, position_swimlanes,
    roadmap_swimlanes, save_config, unscheduled_work_items, update_work_item_state,
    update_work_item_target_date, RoadmapConfig, SwimLane, TimeUnit, UnscheduledWorkItem,
};
use crate::settings::{
    current_process_id, current_project_id, hierarchy_key, project_key, JsonSettings,
    SettingsStore, KEY_PROCESS,
};
use crate::states::{available_states, states_for_process};
use crate::workitem::degrade_to_empty;

/// Scheduling rejects targets further back than this.
const SCHEDULE_PAST_LIMIT_DAYS: i64 = 30;

/// Character cells in the printed timeline bar column.
const BAR_COLUMNS: usize = 30;

#[derive(Subcommand)]
pub enum Commands {
    /// Render the roadmap: swimlane tree, positioned bars and the backlog.
    Roadmap {
        /// Emit the projected tree as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List leaf items with no target date that are not completed.
    Unscheduled,

    /// Inspect or replace the persisted type hierarchy.
    Hierarchy {
        #[command(subcommand)]
        action: HierarchyAction,
    },

    /// Inspect or change the roadmap display range.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Select the current process.
    UseProcess {
        /// Process id.
        id: String,
    },

    /// Select the project for the current process.
    UseProject {
        /// Project id.
        id: String,
    },

    /// Set a work item's target date.
    Schedule {
        /// Work item id.
        id: i64,
        /// Target date: YYYY-MM-DD, "today", "tomorrow", "in Nd" or "in Nw".
        date: Option<String>,
        /// Schedule by axis position instead: percent across the range.
        #[arg(long)]
        at: Option<f64>,
    },

    /// Clear a work item's target date, moving it back to the backlog.
    Unschedule {
        /// Work item id.
        id: i64,
    },

    /// Move a work item to a new state.
    SetState {
        /// Work item id.
        id: i64,
        /// New state name.
        state: String,
    },

    /// Show the process states grouped by category.
    States {
        /// Only list state names allowed for this work item type.
        #[arg(long = "type")]
        work_item_type: Option<String>,
    },

    /// Create starter board and settings files.
    Init {
        /// Process id recorded in the settings and the board.
        #[arg(long, default_value = "default")]
        process: String,
        /// Project name for the board.
        #[arg(long, default_value = "Default")]
        project: String,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum HierarchyAction {
    /// Print the configured levels with their audiences.
    Show,
    /// Replace the hierarchy from JSON (inline or from a file).
    Set {
        /// Hierarchy JSON, current or legacy shape.
        json: Option<String>,
        /// Read the JSON from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective roadmap configuration.
    Show,
    /// Change parts of the configuration.
    Set {
        /// Range start, YYYY-MM-DD.
        #[arg(long)]
        start: Option<String>,
        /// Range end, YYYY-MM-DD.
        #[arg(long)]
        end: Option<String>,
        /// Time unit for bar widths.
        #[arg(long, value_enum)]
        unit: Option<TimeUnit>,
    },
}

/// Parse a target date input with a little natural language support.
///
/// Accepts "today", "tomorrow", "in Nd", "in Nw" and YYYY-MM-DD.
pub fn parse_date_input(s: &str) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    let today = Local::now().date_naive();
    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        _ => {}
    }
    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(days) = rest.strip_suffix('d') {
            if let Ok(days) = days.trim().parse::<i64>() {
                return Some(today + Duration::days(days));
            }
        }
        if let Some(weeks) = rest.strip_suffix('w') {
            if let Ok(weeks) = weeks.trim().parse::<i64>() {
                return Some(today + Duration::weeks(weeks));
            }
        }
    }
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

fn current_ids(settings: &mut JsonSettings) -> (String, String) {
    let process_id = degrade_to_empty("reading current process", current_process_id(settings));
    let project_id = degrade_to_empty(
        "reading current project",
        current_project_id(settings, &process_id),
    );
    (process_id, project_id)
}

/// Render the full roadmap pipeline.
pub fn cmd_roadmap(settings: &mut JsonSettings, board: &JsonBoard, json: bool) {
    let (process_id, project_id) = current_ids(settings);
    let config = load_config(settings);
    let work_items = load_roadmap_work_items(settings, board, &process_id, &project_id);
    let mut swimlanes = roadmap_swimlanes(settings, board, &process_id, &work_items);
    position_swimlanes(&mut swimlanes, &config);
    let (_, parent_types, lowest_types) = work_item_type_levels(settings, &process_id);
    let unscheduled = unscheduled_work_items(&work_items, &lowest_types, &parent_types);

    if json {
        #[derive(Serialize)]
        struct RoadmapView<'a> {
            config: &'a RoadmapConfig,
            swimlanes: &'a [SwimLane],
            unscheduled: &'a [UnscheduledWorkItem],
        }
        let view = RoadmapView {
            config: &config,
            swimlanes: &swimlanes,
            unscheduled: &unscheduled,
        };
        match serde_json::to_string_pretty(&view) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Failed to serialize roadmap: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!(
        "Roadmap {} to {} ({} view)",
        config.start_date,
        config.end_date,
        config.time_unit.name()
    );
    if swimlanes.is_empty() {
        println!("No roadmap rows. Configure a hierarchy with `workboard hierarchy set` and link work items.");
    } else {
        println!(
            "{:<6} {:<40} {:>10} {:>8} {:>8}  Timeline",
            "ID", "Title", "Target", "Left%", "Width%"
        );
        print_lanes(&swimlanes);
    }

    if !unscheduled.is_empty() {
        println!();
        println!("Unscheduled ({} items):", unscheduled.len());
        print_unscheduled(&unscheduled);
    }
}

fn print_lanes(lanes: &[SwimLane]) {
    for lane in lanes {
        let indent = "  ".repeat(lane.level as usize);
        let title = format!("{indent}{}", truncate(&lane.title, 40 - indent.len()));
        match lane.timeline_items.first() {
            Some(item) => {
                let target = item
                    .target_date
                    .map_or_else(|| "-".to_string(), |d| d.to_string());
                println!(
                    "{:<6} {:<40} {:>10} {:>8.1} {:>8.1}  {}",
                    lane.work_item_id,
                    title,
                    target,
                    item.left_position,
                    item.width,
                    render_bar(item.left_position, item.width, BAR_COLUMNS)
                );
            }
            None => {
                println!(
                    "{:<6} {:<40} {:>10}",
                    lane.work_item_id,
                    title,
                    format!("[{}]", lane.work_item_type)
                );
            }
        }
        print_lanes(&lane.children);
    }
}

fn print_unscheduled(items: &[UnscheduledWorkItem]) {
    println!(
        "{:<6} {:<40} {:<12} {}",
        "ID", "Title", "State", "Parent"
    );
    for item in items {
        let parent = if item.parent_title.is_empty() {
            item.parent_id
                .map_or_else(|| "-".to_string(), |id| format!("#{id}"))
        } else {
            format!("{} ({})", item.parent_title, item.parent_type)
        };
        println!(
            "{:<6} {:<40} {:<12} {}",
            item.work_item_id,
            truncate(&item.title, 40),
            item.state,
            parent
        );
    }
}

/// Draw one timeline bar. Off-axis portions are clamped for display only and
/// flagged with edge markers; the printed numbers stay raw.
fn render_bar(left: f64, width: f64, columns: usize) -> String {
    let mut cells = vec!['.'; columns];
    let scale = columns as f64 / 100.0;
    let from = (left * scale).floor() as i64;
    let to = ((left + width) * scale).ceil() as i64;
    for i in from.clamp(0, columns as i64)..to.clamp(0, columns as i64) {
        cells[i as usize] = '=';
    }
    if from < 0 {
        cells[0] = '<';
    }
    if to > columns as i64 {
        cells[columns - 1] = '>';
    }
    cells.into_iter().collect()
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= width {
            out.push('…');
            break;
        }
        out.push(ch);
    }
    out
}

/// List the backlog panel on its own.
pub fn cmd_unscheduled(settings: &mut JsonSettings, board: &JsonBoard) {
    let (process_id, project_id) = current_ids(settings);
    let work_items = load_roadmap_work_items(settings, board, &process_id, &project_id);
    let (_, parent_types, lowest_types) = work_item_type_levels(settings, &process_id);
    let unscheduled = unscheduled_work_items(&work_items, &lowest_types, &parent_types);
    if unscheduled.is_empty() {
        println!("No unscheduled work items.");
        return;
    }
    print_unscheduled(&unscheduled);
}

/// Print the configured hierarchy levels.
pub fn cmd_hierarchy_show(settings: &mut JsonSettings, board: &JsonBoard) {
    let (process_id, _) = current_ids(settings);
    let Some(levels) = load_hierarchy_levels(settings, &process_id) else {
        println!("No hierarchy configured for process '{process_id}'.");
        return;
    };
    for (i, level) in levels.iter().enumerate() {
        let audiences = if level.audience.is_empty() {
            "-".to_string()
        } else {
            level.audience.join(", ")
        };
        let marker = if level.has_audience(AUDIENCE_ROADMAP) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} level {i} {} [{audiences}]: {}",
            level_color(i),
            level.work_item_types.join(", ")
        );
    }
    println!("(* = shown on the roadmap)");

    // Point out configured names the board no longer knows about.
    let resolved = resolve_levels(&levels, &board.board.work_item_types);
    let resolved_count: usize = resolved.iter().map(Vec::len).sum();
    let configured_count: usize = levels.iter().map(|l| l.work_item_types.len()).sum();
    if resolved_count < configured_count {
        println!(
            "Note: {} configured type name(s) do not exist on this board.",
            configured_count - resolved_count
        );
    }
}

/// Replace the persisted hierarchy wholesale.
pub fn cmd_hierarchy_set(
    settings: &mut JsonSettings,
    json: Option<String>,
    file: Option<PathBuf>,
) {
    let text = match (json, file) {
        (Some(json), None) => json,
        (None, Some(path)) => match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Failed to read {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("Provide the hierarchy JSON inline or via --file (not both).");
            std::process::exit(1);
        }
    };

    let Some(levels) = StoredHierarchy::parse(&text).levels() else {
        eprintln!(
            "Not a valid hierarchy. Expected [{{\"WorkItemTypes\": [...], \"Audience\": [...]}}] \
             or the legacy [[...], [...]] shape."
        );
        std::process::exit(1);
    };
    if levels.iter().any(|level| level.work_item_types.is_empty()) {
        eprintln!("Every hierarchy level needs at least one work item type.");
        std::process::exit(1);
    }

    let (process_id, _) = current_ids(settings);
    let serialized = match serialize_hierarchy(&levels) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialize hierarchy: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = settings.set(&hierarchy_key(&process_id), &serialized) {
        eprintln!("Failed to save hierarchy: {e}");
        std::process::exit(1);
    }

    let roadmap_levels = levels
        .iter()
        .filter(|l| l.has_audience(AUDIENCE_ROADMAP))
        .count();
    println!(
        "Saved hierarchy for process '{process_id}': {} levels, {roadmap_levels} on the roadmap.",
        levels.len()
    );
}

/// Print the effective roadmap configuration.
pub fn cmd_config_show(settings: &mut JsonSettings) {
    let config = load_config(settings);
    println!("start-date: {}", config.start_date);
    println!("end-date:   {}", config.end_date);
    println!("time-unit:  {}", config.time_unit.name());
}

/// Change parts of the roadmap configuration.
pub fn cmd_config_set(
    settings: &mut JsonSettings,
    start: Option<String>,
    end: Option<String>,
    unit: Option<TimeUnit>,
) {
    if start.is_none() && end.is_none() && unit.is_none() {
        eprintln!("Nothing to change; pass --start, --end or --unit.");
        std::process::exit(1);
    }

    let mut config = load_config(settings);
    if let Some(start) = start {
        config.start_date = parse_strict_date(&start);
    }
    if let Some(end) = end {
        config.end_date = parse_strict_date(&end);
    }
    if let Some(unit) = unit {
        config.time_unit = unit;
    }
    if config.start_date >= config.end_date {
        eprintln!(
            "Warning: range {} to {} has no span; the timeline will not position items.",
            config.start_date, config.end_date
        );
    }
    if let Err(e) = save_config(settings, &config) {
        eprintln!("Failed to save configuration: {e}");
        std::process::exit(1);
    }
    println!(
        "Roadmap set to {} .. {} ({} view).",
        config.start_date,
        config.end_date,
        config.time_unit.name()
    );
}

fn parse_strict_date(s: &str) -> NaiveDate {
    match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => {
            eprintln!("'{s}' is not a date; expected YYYY-MM-DD.");
            std::process::exit(1);
        }
    }
}

/// Select the current process.
pub fn cmd_use_process(settings: &mut JsonSettings, id: String) {
    if let Err(e) = settings.set(KEY_PROCESS, &id) {
        eprintln!("Failed to save process selection: {e}");
        std::process::exit(1);
    }
    println!("Using process '{id}'.");
}

/// Select the project for the current process.
pub fn cmd_use_project(settings: &mut JsonSettings, id: String) {
    let process_id = degrade_to_empty("reading current process", current_process_id(settings));
    if process_id.is_empty() {
        eprintln!("Select a process first with `workboard use-process`.");
        std::process::exit(1);
    }
    if let Err(e) = settings.set(&project_key(&process_id), &id) {
        eprintln!("Failed to save project selection: {e}");
        std::process::exit(1);
    }
    println!("Using project '{id}' for process '{process_id}'.");
}

/// Set a work item's target date, by date or by axis position.
pub fn cmd_schedule(
    settings: &mut JsonSettings,
    board: &mut JsonBoard,
    id: i64,
    date: Option<String>,
    at: Option<f64>,
) {
    let target = match (at, date) {
        (Some(percent), _) => {
            let config = load_config(settings);
            match date_at_position(percent, &config) {
                Some(date) => date,
                None => {
                    eprintln!("The configured roadmap range has no span; fix it with `workboard config set`.");
                    std::process::exit(1);
                }
            }
        }
        (None, Some(input)) => match parse_date_input(&input) {
            Some(date) => date,
            None => {
                eprintln!("Unrecognised date '{input}'. Try YYYY-MM-DD, today, tomorrow or \"in 3d\".");
                std::process::exit(1);
            }
        },
        (None, None) => {
            eprintln!("Provide a date or --at <percent>.");
            std::process::exit(1);
        }
    };

    let today = Local::now().date_naive();
    if target < today - Duration::days(SCHEDULE_PAST_LIMIT_DAYS) {
        eprintln!("Target date {target} is too far in the past. Choose a more recent date.");
        std::process::exit(1);
    }

    if update_work_item_target_date(board, id, Some(target)) {
        println!("Scheduled work item {id} for {target}.");
    } else {
        eprintln!("Failed to schedule work item {id}.");
        std::process::exit(1);
    }
}

/// Clear a work item's target date.
pub fn cmd_unschedule(board: &mut JsonBoard, id: i64) {
    if update_work_item_target_date(board, id, None) {
        println!("Moved work item {id} to the backlog.");
    } else {
        eprintln!("Failed to unschedule work item {id}.");
        std::process::exit(1);
    }
}

/// Move a work item to a new state, validated against the process states.
pub fn cmd_set_state(settings: &mut JsonSettings, board: &mut JsonBoard, id: i64, state: String) {
    let Some(item) = board.board.work_items.iter().find(|i| i.id == id) else {
        eprintln!("Work item {id} not found.");
        std::process::exit(1);
    };
    let work_item_type = item.work_item_type.clone();

    let process_id = degrade_to_empty("reading current process", current_process_id(settings));
    let allowed = available_states(board, &process_id, &work_item_type);
    if !allowed.is_empty() && !allowed.iter().any(|s| s.eq_ignore_ascii_case(&state)) {
        eprintln!(
            "'{state}' is not a state of {work_item_type} items. Allowed: {}.",
            allowed.join(", ")
        );
        std::process::exit(1);
    }

    if update_work_item_state(board, id, &state) {
        println!("Work item {id} is now '{state}'.");
    } else {
        eprintln!("Failed to update work item {id}.");
        std::process::exit(1);
    }
}

/// Show state groups, or the allowed states of one type.
pub fn cmd_states(settings: &mut JsonSettings, board: &JsonBoard, work_item_type: Option<String>) {
    let process_id = degrade_to_empty("reading current process", current_process_id(settings));

    if let Some(work_item_type) = work_item_type {
        let states = available_states(board, &process_id, &work_item_type);
        if states.is_empty() {
            println!("No states configured for '{work_item_type}'.");
            return;
        }
        for state in states {
            println!("{state}");
        }
        return;
    }

    let groups = states_for_process(board, &process_id);
    if groups.is_empty() {
        println!("No state definitions for process '{process_id}'.");
        return;
    }
    for group in groups {
        println!("{}:", group.display_name);
        for state in group.states {
            println!(
                "  {:<16} {:<8} [{}]",
                state.name,
                state.color,
                state.work_item_types.join(", ")
            );
        }
    }
}

/// Create starter board and settings files.
pub fn cmd_init(settings_path: &Path, board_path: &Path, process: &str, project: &str) {
    if board_path.exists() {
        eprintln!("Board already exists at {}.", board_path.display());
        std::process::exit(1);
    }
    let mut board = match JsonBoard::open(board_path) {
        Ok(board) => board,
        Err(e) => {
            eprintln!("Failed to open board {}: {e}", board_path.display());
            std::process::exit(1);
        }
    };
    board.board = Board::starter(process, project);
    if let Err(e) = board.save() {
        eprintln!("Failed to create board: {e}");
        std::process::exit(1);
    }

    let mut settings = match JsonSettings::open(settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to open settings {}: {e}", settings_path.display());
            std::process::exit(1);
        }
    };
    let saved = settings
        .set(KEY_PROCESS, process)
        .and_then(|()| settings.set(&project_key(process), project));
    if let Err(e) = saved {
        eprintln!("Failed to save settings: {e}");
        std::process::exit(1);
    }

    println!(
        "Created board {} for project '{project}' (process '{process}').",
        board_path.display()
    );
    println!("Next: `workboard hierarchy set` to choose the roadmap levels.");
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "workboard", &mut io::stdout());
}
