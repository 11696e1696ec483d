//! State definitions grouped by category.
//!
//! Feeds the allowed-state pickers: raw per-type state definitions are
//! merged into one summary per state name within each category, and the
//! categories are presented in workflow order.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::workitem::{
    degrade_to_empty, StateCategory, StateDefinition, WorkItemSource,
};

/// A state merged across the work item types that share it.
#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub name: String,
    pub color: String,
    pub category: StateCategory,
    pub order: i32,
    pub is_completed: bool,
    pub work_item_types: Vec<String>,
}

/// States of one category, ordered for display.
#[derive(Debug, Clone, Serialize)]
pub struct StateGroup {
    pub category: StateCategory,
    pub display_name: String,
    pub states: Vec<StateSummary>,
    pub order: i32,
}

fn category_rank(category: StateCategory) -> (&'static str, i32) {
    match category {
        StateCategory::Proposed => ("Proposed", 1),
        StateCategory::InProgress => ("In Progress", 2),
        StateCategory::Completed => ("Completed", 3),
        StateCategory::Removed => ("Removed", 4),
        StateCategory::Unknown => ("Unknown", 999),
    }
}

/// Group raw state definitions by category.
///
/// A state name appearing for several work item types becomes one summary
/// carrying all of those types; the first definition seen supplies color and
/// order. Categories come out in workflow order, states by their `order`.
pub fn group_state_definitions(definitions: &[StateDefinition]) -> Vec<StateGroup> {
    let mut by_category: BTreeMap<StateCategory, BTreeMap<String, StateSummary>> = BTreeMap::new();

    for def in definitions {
        let states = by_category.entry(def.category).or_default();
        let summary = states.entry(def.name.clone()).or_insert_with(|| StateSummary {
            name: def.name.clone(),
            color: if def.color.is_empty() {
                "#1976d2".to_string()
            } else {
                def.color.clone()
            },
            category: def.category,
            order: def.order,
            is_completed: def.category == StateCategory::Completed,
            work_item_types: Vec::new(),
        });
        if !summary.work_item_types.contains(&def.work_item_type) {
            summary.work_item_types.push(def.work_item_type.clone());
        }
    }

    let mut groups: Vec<StateGroup> = by_category
        .into_iter()
        .map(|(category, states)| {
            let (display_name, order) = category_rank(category);
            let mut states: Vec<StateSummary> = states.into_values().collect();
            states.sort_by_key(|s| s.order);
            StateGroup {
                category,
                display_name: display_name.to_string(),
                states,
                order,
            }
        })
        .collect();
    groups.sort_by_key(|g| g.order);
    groups
}

/// Names of the states a work item type may take, in workflow order.
pub fn available_states_for_type(groups: &[StateGroup], work_item_type: &str) -> Vec<String> {
    let mut states: Vec<&StateSummary> = groups
        .iter()
        .flat_map(|group| group.states.iter())
        .filter(|state| {
            state
                .work_item_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(work_item_type))
        })
        .collect();
    states.sort_by_key(|s| s.order);
    states.into_iter().map(|s| s.name.clone()).collect()
}

/// Grouped state definitions for a process; degrades to empty on failure.
pub fn states_for_process(source: &impl WorkItemSource, process_id: &str) -> Vec<StateGroup> {
    let definitions = degrade_to_empty(
        "querying state definitions",
        source.state_definitions(process_id),
    );
    group_state_definitions(&definitions)
}

/// Allowed state names for one work item type; degrades to empty on failure.
pub fn available_states(
    source: &impl WorkItemSource,
    process_id: &str,
    work_item_type: &str,
) -> Vec<String> {
    let groups = states_for_process(source, process_id);
    available_states_for_type(&groups, work_item_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(wit: &str, name: &str, category: StateCategory, order: i32) -> StateDefinition {
        StateDefinition {
            work_item_type: wit.to_string(),
            name: name.to_string(),
            color: String::new(),
            category,
            order,
        }
    }

    #[test]
    fn groups_come_out_in_workflow_order() {
        let defs = vec![
            def("Epic", "Done", StateCategory::Completed, 30),
            def("Epic", "New", StateCategory::Proposed, 10),
            def("Epic", "Active", StateCategory::InProgress, 20),
            def("Epic", "Removed", StateCategory::Removed, 40),
        ];
        let groups = group_state_definitions(&defs);
        let names: Vec<&str> = groups.iter().map(|g| g.display_name.as_str()).collect();
        assert_eq!(names, vec!["Proposed", "In Progress", "Completed", "Removed"]);
        assert!(groups[2].states[0].is_completed);
    }

    #[test]
    fn shared_states_merge_their_types() {
        let defs = vec![
            def("Epic", "New", StateCategory::Proposed, 1),
            def("Feature", "New", StateCategory::Proposed, 1),
            def("Feature", "Planned", StateCategory::Proposed, 2),
        ];
        let groups = group_state_definitions(&defs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].states.len(), 2);
        assert_eq!(groups[0].states[0].work_item_types, vec!["Epic", "Feature"]);
    }

    #[test]
    fn allowed_states_filter_by_type_case_insensitively() {
        let defs = vec![
            def("Epic", "New", StateCategory::Proposed, 1),
            def("Epic", "Active", StateCategory::InProgress, 2),
            def("Feature", "Planned", StateCategory::Proposed, 1),
        ];
        let groups = group_state_definitions(&defs);
        assert_eq!(available_states_for_type(&groups, "epic"), vec!["New", "Active"]);
        assert_eq!(available_states_for_type(&groups, "Feature"), vec!["Planned"]);
        assert!(available_states_for_type(&groups, "Bug").is_empty());
    }
}
