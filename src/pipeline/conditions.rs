//! Named filter conditions, grouped by the column data type they apply to.
//!
//! Every condition is total: a missing or unreadable cell value, or search
//! text that does not parse for the family, yields "no match" unless the
//! condition is one of the explicit null/empty checks.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::columns::DataType;
use crate::state::data_model;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StringCondition {
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
    Equals,
    DoesNotEqual,
    Empty,
    NotEmpty,
    Null,
    NotNull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberCondition {
    Equals,
    DoesNotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqualTo,
    LessThanOrEqualTo,
    Empty,
    NotEmpty,
    Null,
    NotNull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BooleanCondition {
    All,
    True,
    False,
    Empty,
    NotEmpty,
    Null,
    NotNull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateCondition {
    Equals,
    DoesNotEqual,
    Before,
    After,
    Today,
    Yesterday,
    ThisMonth,
    LastMonth,
    NextMonth,
    ThisYear,
    LastYear,
    NextYear,
    Empty,
    NotEmpty,
    Null,
    NotNull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", content = "name", rename_all = "camelCase")]
pub enum FilterCondition {
    String(StringCondition),
    Number(NumberCondition),
    Boolean(BooleanCondition),
    Date(DateCondition),
}

impl FilterCondition {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::String,
            Self::Number(_) => DataType::Number,
            Self::Boolean(_) => DataType::Boolean,
            Self::Date(_) => DataType::Date,
        }
    }

    /// Whether the condition reads the search value at all.
    pub fn is_unary(&self) -> bool {
        match self {
            Self::String(c) => matches!(
                c,
                StringCondition::Empty
                    | StringCondition::NotEmpty
                    | StringCondition::Null
                    | StringCondition::NotNull
            ),
            Self::Number(c) => matches!(
                c,
                NumberCondition::Empty
                    | NumberCondition::NotEmpty
                    | NumberCondition::Null
                    | NumberCondition::NotNull
            ),
            Self::Boolean(_) => true,
            Self::Date(c) => !matches!(
                c,
                DateCondition::Equals
                    | DateCondition::DoesNotEqual
                    | DateCondition::Before
                    | DateCondition::After
            ),
        }
    }

    pub fn evaluate(
        &self,
        target: &Value,
        search: &Value,
        ignore_case: bool,
        ctx: &FilterContext,
    ) -> bool {
        match self {
            Self::String(c) => string_condition(*c, target, search, ignore_case),
            Self::Number(c) => number_condition(*c, target, search),
            Self::Boolean(c) => boolean_condition(*c, target),
            Self::Date(c) => date_condition(*c, target, search, ctx),
        }
    }
}

/// Evaluation context for conditions relative to "now".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterContext {
    pub today: NaiveDate,
}

impl FilterContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn now() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }
}

impl Default for FilterContext {
    fn default() -> Self {
        Self::now()
    }
}

fn is_empty_string(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn string_condition(cond: StringCondition, target: &Value, search: &Value, ignore_case: bool) -> bool {
    let fold = |v: &Value| {
        let text = data_model::display_value(v);
        if ignore_case {
            text.to_lowercase()
        } else {
            text
        }
    };

    match cond {
        StringCondition::Null => target.is_null(),
        StringCondition::NotNull => !target.is_null(),
        StringCondition::Empty => is_empty_string(target),
        StringCondition::NotEmpty => !is_empty_string(target),
        StringCondition::Contains => fold(target).contains(&fold(search)),
        StringCondition::DoesNotContain => !fold(target).contains(&fold(search)),
        StringCondition::StartsWith => fold(target).starts_with(&fold(search)),
        StringCondition::EndsWith => fold(target).ends_with(&fold(search)),
        StringCondition::Equals => fold(target) == fold(search),
        StringCondition::DoesNotEqual => fold(target) != fold(search),
    }
}

fn number_condition(cond: NumberCondition, target: &Value, search: &Value) -> bool {
    let target_num = data_model::value_as_f64(target);
    let is_empty = target.is_null() || target_num.is_none();

    let compare = |op: fn(f64, f64) -> bool| {
        let Some(search) = data_model::value_as_f64(search) else {
            return false;
        };
        // A null cell is unequal to any number but never ordered against one.
        match target_num {
            Some(target) => op(target, search),
            None => cond == NumberCondition::DoesNotEqual && target.is_null(),
        }
    };

    match cond {
        NumberCondition::Null => target.is_null(),
        NumberCondition::NotNull => !target.is_null(),
        NumberCondition::Empty => is_empty,
        NumberCondition::NotEmpty => !is_empty,
        NumberCondition::Equals => compare(|a, b| a == b),
        NumberCondition::DoesNotEqual => compare(|a, b| a != b),
        NumberCondition::GreaterThan => compare(|a, b| a > b),
        NumberCondition::LessThan => compare(|a, b| a < b),
        NumberCondition::GreaterThanOrEqualTo => compare(|a, b| a >= b),
        NumberCondition::LessThanOrEqualTo => compare(|a, b| a <= b),
    }
}

fn boolean_condition(cond: BooleanCondition, target: &Value) -> bool {
    match cond {
        BooleanCondition::All => true,
        BooleanCondition::True => data_model::value_as_bool(target) == Some(true),
        BooleanCondition::False => data_model::value_as_bool(target) == Some(false),
        BooleanCondition::Null | BooleanCondition::Empty => target.is_null(),
        BooleanCondition::NotNull | BooleanCondition::NotEmpty => !target.is_null(),
    }
}

fn date_condition(cond: DateCondition, target: &Value, search: &Value, ctx: &FilterContext) -> bool {
    match cond {
        DateCondition::Null => target.is_null(),
        DateCondition::NotNull => !target.is_null(),
        DateCondition::Empty => is_empty_string(target),
        DateCondition::NotEmpty => !is_empty_string(target),
        _ => data_model::value_as_datetime(target)
            .is_some_and(|target| date_matches(cond, target, search, ctx)),
    }
}

fn date_matches(cond: DateCondition, target: NaiveDateTime, search: &Value, ctx: &FilterContext) -> bool {
    let day = target.date();
    match cond {
        DateCondition::Equals => search_datetime(search).is_some_and(|s| s.date() == day),
        DateCondition::DoesNotEqual => search_datetime(search).is_some_and(|s| s.date() != day),
        DateCondition::Before => search_datetime(search).is_some_and(|s| target < s),
        DateCondition::After => search_datetime(search).is_some_and(|s| target > s),
        DateCondition::Today => day == ctx.today,
        DateCondition::Yesterday => Some(day) == ctx.today.pred_opt(),
        DateCondition::ThisMonth => month_key(day) == month_key(ctx.today),
        DateCondition::LastMonth => month_key(day) == shift_month(ctx.today, -1),
        DateCondition::NextMonth => month_key(day) == shift_month(ctx.today, 1),
        DateCondition::ThisYear => day.year() == ctx.today.year(),
        DateCondition::LastYear => day.year() == ctx.today.year() - 1,
        DateCondition::NextYear => day.year() == ctx.today.year() + 1,
        DateCondition::Empty | DateCondition::NotEmpty | DateCondition::Null | DateCondition::NotNull => false,
    }
}

fn search_datetime(search: &Value) -> Option<NaiveDateTime> {
    data_model::value_as_datetime(search)
}

fn month_key(day: NaiveDate) -> (i32, u32) {
    (day.year(), day.month())
}

fn shift_month(day: NaiveDate, delta: i32) -> (i32, u32) {
    let zero_based = day.year() * 12 + day.month0() as i32 + delta;
    (zero_based.div_euclid(12), zero_based.rem_euclid(12) as u32 + 1)
}
