use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::state::data_model::{self, Row};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortingDirection {
    #[default]
    None,
    Asc,
    Desc,
}

impl SortingDirection {
    pub fn toggle(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc | Self::None => Self::Asc,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingExpression {
    pub field_name: String,
    pub dir: SortingDirection,
    #[serde(default = "default_ignore_case")]
    pub ignore_case: bool,
}

impl SortingExpression {
    pub fn new(field_name: impl Into<String>, dir: SortingDirection) -> Self {
        Self {
            field_name: field_name.into(),
            dir,
            ignore_case: true,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.ignore_case = false;
        self
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ordering = compare_values(
            data_model::field_value(a, &self.field_name),
            data_model::field_value(b, &self.field_name),
            self.ignore_case,
        );
        match self.dir {
            SortingDirection::Desc => ordering.reverse(),
            SortingDirection::Asc | SortingDirection::None => ordering,
        }
    }
}

/// Inserts or replaces the expression for `expr.field_name`, keeping its
/// priority slot. `dir = None` removes the field instead. Returns whether the
/// list changed.
pub fn upsert_expression(expressions: &mut Vec<SortingExpression>, expr: SortingExpression) -> bool {
    let existing = expressions
        .iter()
        .position(|e| e.field_name == expr.field_name);

    match (existing, expr.dir) {
        (Some(idx), SortingDirection::None) => {
            expressions.remove(idx);
            true
        }
        (None, SortingDirection::None) => false,
        (Some(idx), _) => {
            if expressions[idx] == expr {
                return false;
            }
            expressions[idx] = expr;
            true
        }
        (None, _) => {
            expressions.push(expr);
            true
        }
    }
}

/// The sort stage. Stable: rows equal on every key keep their input order.
pub fn sort(data: &[Row], rows: &[usize], expressions: &[SortingExpression]) -> Vec<usize> {
    let mut sorted: Vec<usize> = rows.iter().copied().filter(|idx| *idx < data.len()).collect();
    let active: Vec<&SortingExpression> = expressions
        .iter()
        .filter(|e| e.dir != SortingDirection::None)
        .collect();

    if active.is_empty() {
        return sorted;
    }

    sorted.sort_by(|a, b| {
        let (left, right) = (&data[*a], &data[*b]);
        active
            .iter()
            .fold(Ordering::Equal, |acc, expr| acc.then_with(|| expr.compare(left, right)))
    });
    sorted
}

/// Row-valued convenience over [`sort`].
pub fn sort_rows(data: &[Row], expressions: &[SortingExpression]) -> Vec<Row> {
    let all: Vec<usize> = (0..data.len()).collect();
    sort(data, &all, expressions)
        .into_iter()
        .map(|idx| data[idx].clone())
        .collect()
}

/// Null sorts first; mixed types order by type, then by displayed text.
pub fn compare_values(left: &Value, right: &Value, ignore_case: bool) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) if ignore_case => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(left)
            .cmp(&type_rank(right))
            .then_with(|| data_model::display_value(left).cmp(&data_model::display_value(right))),
    }
}

fn compare_numbers(left: &Number, right: &Number) -> Ordering {
    match (left.as_i64(), left.as_u64(), right.as_i64(), right.as_u64()) {
        (Some(a), _, Some(b), _) => a.cmp(&b),
        (Some(a), _, _, Some(b)) => {
            if a < 0 {
                Ordering::Less
            } else {
                (a as u64).cmp(&b)
            }
        }
        (_, Some(a), Some(b), _) => {
            if b < 0 {
                Ordering::Greater
            } else {
                a.cmp(&(b as u64))
            }
        }
        (_, Some(a), _, Some(b)) => a.cmp(&b),
        _ => {
            let left = left.as_f64().unwrap_or(f64::NAN);
            let right = right.as_f64().unwrap_or(f64::NAN);
            left.partial_cmp(&right).unwrap_or(Ordering::Equal)
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn default_ignore_case() -> bool {
    true
}
