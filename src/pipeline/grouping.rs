//! The group stage.
//!
//! Input must already be sorted by the grouping expressions: a group is a
//! contiguous run of rows whose key compares equal. Groups are kept in an
//! arena (`GroupByResult::groups`) with parent/child links, and the flattened
//! output interleaves group headers with the data rows of expanded groups.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::sorting::{compare_values, SortingExpression};
use crate::state::data_model::{self, Row};

/// Grouping shares the shape of a sort key: field, direction, case handling.
pub type GroupingExpression = SortingExpression;

pub type GroupId = usize;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupKey {
    pub field_name: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupExpansionState {
    pub hierarchy: Vec<GroupKey>,
    pub expanded: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupingState {
    #[serde(default)]
    pub expressions: Vec<GroupingExpression>,
    #[serde(default)]
    pub expansion: Vec<GroupExpansionState>,
    #[serde(default = "default_expanded")]
    pub default_expanded: bool,
}

impl Default for GroupingState {
    fn default() -> Self {
        Self {
            expressions: Vec::new(),
            expansion: Vec::new(),
            default_expanded: true,
        }
    }
}

impl GroupingState {
    pub fn is_expanded(&self, hierarchy: &[GroupKey]) -> bool {
        self.expansion
            .iter()
            .find(|state| state.hierarchy == hierarchy)
            .map(|state| state.expanded)
            .unwrap_or(self.default_expanded)
    }

    /// Returns whether the stored state changed.
    pub fn set_expanded(&mut self, hierarchy: &[GroupKey], expanded: bool) -> bool {
        if self.is_expanded(hierarchy) == expanded {
            return false;
        }
        match self
            .expansion
            .iter_mut()
            .find(|state| state.hierarchy == hierarchy)
        {
            Some(state) => state.expanded = expanded,
            None => self.expansion.push(GroupExpansionState {
                hierarchy: hierarchy.to_vec(),
                expanded,
            }),
        }
        true
    }

    pub fn toggle(&mut self, hierarchy: &[GroupKey]) -> bool {
        let expanded = self.is_expanded(hierarchy);
        self.set_expanded(hierarchy, !expanded);
        !expanded
    }

    /// Drops expansion entries whose hierarchy no longer matches the
    /// grouping expressions (after a field is ungrouped).
    pub fn prune_expansion(&mut self) {
        let fields: Vec<&str> = self
            .expressions
            .iter()
            .map(|e| e.field_name.as_str())
            .collect();
        self.expansion.retain(|state| {
            state.hierarchy.len() <= fields.len()
                && state
                    .hierarchy
                    .iter()
                    .zip(&fields)
                    .all(|(key, field)| key.field_name == *field)
        });
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupRecord {
    pub expression: GroupingExpression,
    pub level: usize,
    pub value: Value,
    /// Dataset indices of every row in the group, including nested groups.
    pub records: Vec<usize>,
    pub parent: Option<GroupId>,
    pub groups: Vec<GroupId>,
}

/// One row of the flattened output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridRecord {
    /// A data row, as an index into the dataset.
    Data(usize),
    /// A group header pseudo-row.
    Group(GroupId),
}

impl GridRecord {
    pub fn data_index(&self) -> Option<usize> {
        match self {
            Self::Data(idx) => Some(*idx),
            Self::Group(_) => None,
        }
    }

    pub fn is_group_header(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupByResult {
    pub data: Vec<GridRecord>,
    /// Parallel to `data`: the innermost group of each record (a header's
    /// own group). `None` when nothing is grouped.
    pub metadata: Vec<Option<GroupId>>,
    pub groups: Vec<GroupRecord>,
}

impl GroupByResult {
    pub fn passthrough(rows: &[usize]) -> Self {
        Self {
            data: rows.iter().copied().map(GridRecord::Data).collect(),
            metadata: vec![None; rows.len()],
            groups: Vec::new(),
        }
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupRecord> {
        self.groups.get(id)
    }

    pub fn root_groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.parent.is_none())
            .map(|(id, _)| id)
    }

    /// Field/value chain from the top-level group down to `id`.
    pub fn hierarchy(&self, id: GroupId) -> Vec<GroupKey> {
        group_hierarchy(&self.groups, id)
    }

    pub fn is_row_in_group(&self, row_index: usize, id: GroupId) -> bool {
        self.groups
            .get(id)
            .is_some_and(|g| g.records.contains(&row_index))
    }

    /// Finds the group for a hierarchy produced by [`Self::hierarchy`].
    pub fn find_group(&self, hierarchy: &[GroupKey]) -> Option<GroupId> {
        (0..self.groups.len()).find(|id| self.hierarchy(*id) == hierarchy)
    }
}

/// Walks parent links in a group arena, returning the chain root-first.
pub fn group_hierarchy(groups: &[GroupRecord], id: GroupId) -> Vec<GroupKey> {
    let mut chain = Vec::new();
    let mut cursor = Some(id);
    while let Some(current) = cursor.and_then(|c| groups.get(c)) {
        chain.push(GroupKey {
            field_name: current.expression.field_name.clone(),
            value: current.value.clone(),
        });
        cursor = current.parent;
    }
    chain.reverse();
    chain
}

/// Groups `rows` (already sorted by the grouping expressions) and flattens the
/// result according to the expansion state.
pub fn group(data: &[Row], rows: &[usize], state: &GroupingState) -> GroupByResult {
    if state.expressions.is_empty() {
        return GroupByResult::passthrough(rows);
    }

    let mut result = GroupByResult::default();
    let rows: Vec<usize> = rows.iter().copied().filter(|idx| *idx < data.len()).collect();
    let roots = build_groups(data, &rows, &state.expressions, 0, None, &mut result.groups);

    for root in roots {
        flatten_group(root, state, &mut result);
    }
    result
}

fn build_groups(
    data: &[Row],
    rows: &[usize],
    expressions: &[GroupingExpression],
    level: usize,
    parent: Option<GroupId>,
    arena: &mut Vec<GroupRecord>,
) -> Vec<GroupId> {
    let Some(expression) = expressions.get(level) else {
        return Vec::new();
    };

    let mut ids = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let key = data_model::field_value(&data[rows[start]], &expression.field_name);
        let run = rows[start..]
            .iter()
            .take_while(|idx| {
                let value = data_model::field_value(&data[**idx], &expression.field_name);
                compare_values(key, value, expression.ignore_case) == Ordering::Equal
            })
            .count();
        let members = &rows[start..start + run];

        let id = arena.len();
        arena.push(GroupRecord {
            expression: expression.clone(),
            level,
            value: key.clone(),
            records: members.to_vec(),
            parent,
            groups: Vec::new(),
        });
        let children = build_groups(data, members, expressions, level + 1, Some(id), arena);
        arena[id].groups = children;

        ids.push(id);
        start += run;
    }
    ids
}

fn flatten_group(id: GroupId, state: &GroupingState, result: &mut GroupByResult) {
    result.data.push(GridRecord::Group(id));
    result.metadata.push(Some(id));

    if !state.is_expanded(&result.hierarchy(id)) {
        return;
    }

    let group = &result.groups[id];
    if group.groups.is_empty() {
        let records = group.records.clone();
        for idx in records {
            result.data.push(GridRecord::Data(idx));
            result.metadata.push(Some(id));
        }
    } else {
        for child in group.groups.clone() {
            flatten_group(child, state, result);
        }
    }
}

fn default_expanded() -> bool {
    true
}
