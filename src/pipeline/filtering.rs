//! Filtering expression trees and the filter stage.
//!
//! A tree is a group node holding an AND/OR operator and any mix of leaf
//! expressions and nested groups. All traversals go through
//! [`FilteringExpressionsTree::fold`], which visits children lazily so AND/OR
//! evaluation still short-circuits.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::conditions::{FilterCondition, FilterContext};
use crate::state::data_model::{self, Row};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilteringLogic {
    #[default]
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilteringExpression {
    pub field_name: String,
    pub condition: FilterCondition,
    #[serde(default)]
    pub search_value: Value,
    #[serde(default = "default_ignore_case")]
    pub ignore_case: bool,
}

impl FilteringExpression {
    pub fn new(field_name: impl Into<String>, condition: FilterCondition, search_value: Value) -> Self {
        Self {
            field_name: field_name.into(),
            condition,
            search_value,
            ignore_case: true,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.ignore_case = false;
        self
    }

    pub fn matches(&self, row: &Row, ctx: &FilterContext) -> bool {
        let target = data_model::field_value(row, &self.field_name);
        self.condition
            .evaluate(target, &self.search_value, self.ignore_case, ctx)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilterNode {
    Leaf(FilteringExpression),
    Group(FilteringExpressionsTree),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteringExpressionsTree {
    pub operator: FilteringLogic,
    /// Set on per-column sub-trees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default)]
    pub operands: Vec<FilterNode>,
}

impl FilteringExpressionsTree {
    pub fn new(operator: FilteringLogic) -> Self {
        Self {
            operator,
            field_name: None,
            operands: Vec::new(),
        }
    }

    pub fn for_field(operator: FilteringLogic, field_name: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            ..Self::new(operator)
        }
    }

    pub fn with_expression(mut self, expr: FilteringExpression) -> Self {
        self.operands.push(FilterNode::Leaf(expr));
        self
    }

    pub fn with_tree(mut self, tree: FilteringExpressionsTree) -> Self {
        self.operands.push(FilterNode::Group(tree));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    /// Bottom-up fold. `group` receives the group node and a lazy
    /// iterator over its children's results.
    pub fn fold<T, L, G>(&self, leaf: &L, group: &G) -> T
    where
        L: Fn(&FilteringExpression) -> T,
        G: Fn(&FilteringExpressionsTree, &mut dyn Iterator<Item = T>) -> T,
    {
        let mut children = self.operands.iter().map(|node| match node {
            FilterNode::Leaf(expr) => leaf(expr),
            FilterNode::Group(tree) => tree.fold(leaf, group),
        });
        group(self, &mut children)
    }

    /// An empty group matches everything; otherwise AND/OR with
    /// short-circuiting.
    pub fn matches(&self, row: &Row, ctx: &FilterContext) -> bool {
        self.fold(
            &|expr: &FilteringExpression| expr.matches(row, ctx),
            &|tree: &FilteringExpressionsTree, children: &mut dyn Iterator<Item = bool>| {
                let mut seen = false;
                for matched in children {
                    seen = true;
                    match (tree.operator, matched) {
                        (FilteringLogic::And, false) => return false,
                        (FilteringLogic::Or, true) => return true,
                        _ => {}
                    }
                }
                tree.operator == FilteringLogic::And || !seen
            },
        )
    }

    pub fn expression_count(&self) -> usize {
        self.fold(
            &|_: &FilteringExpression| 1,
            &|_: &FilteringExpressionsTree, children: &mut dyn Iterator<Item = usize>| {
                children.sum()
            },
        )
    }

    pub fn referenced_fields(&self) -> BTreeSet<String> {
        self.fold(
            &|expr: &FilteringExpression| BTreeSet::from([expr.field_name.clone()]),
            &|_: &FilteringExpressionsTree,
              children: &mut dyn Iterator<Item = BTreeSet<String>>| {
                children.flatten().collect()
            },
        )
    }

    pub fn column_filter(&self, field: &str) -> Option<&FilteringExpressionsTree> {
        self.operands.iter().find_map(|node| match node {
            FilterNode::Group(tree) if tree.field_name.as_deref() == Some(field) => Some(tree),
            _ => None,
        })
    }

    /// Replaces (or appends) the top-level sub-tree for `field`.
    pub fn set_column_filter(&mut self, mut tree: FilteringExpressionsTree, field: &str) {
        tree.field_name = Some(field.to_string());
        let existing = self.operands.iter_mut().find(|node| {
            matches!(node, FilterNode::Group(t) if t.field_name.as_deref() == Some(field))
        });
        match existing {
            Some(slot) => *slot = FilterNode::Group(tree),
            None => self.operands.push(FilterNode::Group(tree)),
        }
    }

    /// Removes every top-level operand that targets `field`. Returns whether
    /// anything was removed.
    pub fn remove_column_filter(&mut self, field: &str) -> bool {
        let before = self.operands.len();
        self.operands.retain(|node| match node {
            FilterNode::Leaf(expr) => expr.field_name != field,
            FilterNode::Group(tree) => tree.field_name.as_deref() != Some(field),
        });
        before != self.operands.len()
    }
}

/// The filter stage: keeps the indices in `rows` whose row satisfies `tree`.
pub fn filter(
    data: &[Row],
    rows: &[usize],
    tree: &FilteringExpressionsTree,
    ctx: &FilterContext,
) -> Vec<usize> {
    if tree.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .copied()
        .filter(|idx| data.get(*idx).is_some_and(|row| tree.matches(row, ctx)))
        .collect()
}

/// Row-valued convenience over [`filter`].
pub fn filter_rows(data: &[Row], tree: &FilteringExpressionsTree, ctx: &FilterContext) -> Vec<Row> {
    data.iter()
        .filter(|row| tree.is_empty() || tree.matches(row, ctx))
        .cloned()
        .collect()
}

fn default_ignore_case() -> bool {
    true
}
