use chrono::NaiveDate;
use serde_json::{json, Value};

use gridcore::pipeline::conditions::{
    BooleanCondition, DateCondition, FilterCondition, FilterContext, NumberCondition,
    StringCondition,
};
use gridcore::pipeline::filtering::{
    self, FilterNode, FilteringExpression, FilteringExpressionsTree, FilteringLogic,
};
use gridcore::state::data_model::{Row, TableData};

fn rows(value: Value) -> TableData {
    serde_json::from_value(value).unwrap()
}

fn ctx() -> FilterContext {
    FilterContext::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
}

fn eval(condition: FilterCondition, target: Value, search: Value) -> bool {
    condition.evaluate(&target, &search, true, &ctx())
}

fn string(c: StringCondition) -> FilterCondition {
    FilterCondition::String(c)
}

fn number(c: NumberCondition) -> FilterCondition {
    FilterCondition::Number(c)
}

fn date(c: DateCondition) -> FilterCondition {
    FilterCondition::Date(c)
}

#[test]
fn test_string_conditions() {
    assert!(eval(string(StringCondition::Contains), json!("Hello"), json!("ell")));
    assert!(eval(string(StringCondition::DoesNotContain), json!("Hello"), json!("xyz")));
    assert!(eval(string(StringCondition::StartsWith), json!("Hello"), json!("he")));
    assert!(eval(string(StringCondition::EndsWith), json!("Hello"), json!("LO")));
    assert!(eval(string(StringCondition::Equals), json!("abc"), json!("ABC")));
    assert!(eval(string(StringCondition::DoesNotEqual), json!("b"), json!("a")));
    assert!(eval(string(StringCondition::Contains), json!(1234), json!("23")));
}

#[test]
fn test_string_case_sensitivity_is_per_expression() {
    let cond = string(StringCondition::Equals);
    assert!(!cond.evaluate(&json!("abc"), &json!("ABC"), false, &ctx()));
    assert!(cond.evaluate(&json!("abc"), &json!("ABC"), true, &ctx()));
}

#[test]
fn test_string_null_and_empty_variants() {
    assert!(eval(string(StringCondition::Null), Value::Null, Value::Null));
    assert!(!eval(string(StringCondition::Null), json!(""), Value::Null));
    assert!(eval(string(StringCondition::Empty), json!(""), Value::Null));
    assert!(eval(string(StringCondition::Empty), Value::Null, Value::Null));
    assert!(eval(string(StringCondition::NotEmpty), json!("a"), Value::Null));
    assert!(eval(string(StringCondition::NotNull), json!(""), Value::Null));
}

#[test]
fn test_number_comparisons() {
    assert!(eval(number(NumberCondition::Equals), json!(5), json!("5")));
    assert!(eval(number(NumberCondition::GreaterThan), json!(5), json!(4.5)));
    assert!(eval(number(NumberCondition::LessThan), json!("3"), json!(4)));
    assert!(eval(number(NumberCondition::GreaterThanOrEqualTo), json!(4), json!(4)));
    assert!(eval(number(NumberCondition::LessThanOrEqualTo), json!(4), json!(4)));
    assert!(eval(number(NumberCondition::DoesNotEqual), json!(4), json!(5)));
}

#[test]
fn test_number_malformed_search_never_matches() {
    for cond in [
        NumberCondition::Equals,
        NumberCondition::DoesNotEqual,
        NumberCondition::GreaterThan,
        NumberCondition::LessThanOrEqualTo,
    ] {
        assert!(!eval(number(cond), json!(5), json!("five")));
    }
}

#[test]
fn test_number_null_target() {
    assert!(!eval(number(NumberCondition::Equals), Value::Null, json!(1)));
    assert!(!eval(number(NumberCondition::GreaterThan), Value::Null, json!(1)));
    assert!(eval(number(NumberCondition::DoesNotEqual), Value::Null, json!(1)));
    assert!(eval(number(NumberCondition::Null), Value::Null, Value::Null));
    assert!(eval(number(NumberCondition::Empty), json!("n/a"), Value::Null));
    assert!(eval(number(NumberCondition::NotEmpty), json!(0), Value::Null));
}

#[test]
fn test_boolean_conditions() {
    let cond = |c| FilterCondition::Boolean(c);
    assert!(eval(cond(BooleanCondition::All), Value::Null, Value::Null));
    assert!(eval(cond(BooleanCondition::True), json!(true), Value::Null));
    assert!(eval(cond(BooleanCondition::True), json!("true"), Value::Null));
    assert!(eval(cond(BooleanCondition::False), json!(false), Value::Null));
    assert!(!eval(cond(BooleanCondition::False), Value::Null, Value::Null));
    assert!(eval(cond(BooleanCondition::Empty), Value::Null, Value::Null));
    assert!(eval(cond(BooleanCondition::NotNull), json!(false), Value::Null));
}

#[test]
fn test_date_comparisons() {
    assert!(eval(date(DateCondition::Equals), json!("2024-03-01T10:00:00"), json!("2024-03-01")));
    assert!(eval(date(DateCondition::DoesNotEqual), json!("2024-03-02"), json!("2024-03-01")));
    assert!(eval(date(DateCondition::Before), json!("2024-02-28"), json!("2024-03-01")));
    assert!(eval(date(DateCondition::After), json!("2024-03-02"), json!("2024-03-01")));
    assert!(!eval(date(DateCondition::Before), json!("garbage"), json!("2024-03-01")));
    assert!(!eval(date(DateCondition::After), json!("2024-03-02"), json!("garbage")));
}

#[test]
fn test_date_relative_buckets() {
    let today = json!("2024-03-15");
    assert!(eval(date(DateCondition::Today), today.clone(), Value::Null));
    assert!(eval(date(DateCondition::Yesterday), json!("2024-03-14"), Value::Null));
    assert!(eval(date(DateCondition::ThisMonth), json!("2024-03-01"), Value::Null));
    assert!(eval(date(DateCondition::LastMonth), json!("2024-02-29"), Value::Null));
    assert!(eval(date(DateCondition::NextMonth), json!("2024-04-30"), Value::Null));
    assert!(eval(date(DateCondition::ThisYear), json!("2024-12-31"), Value::Null));
    assert!(eval(date(DateCondition::LastYear), json!("2023-01-01"), Value::Null));
    assert!(eval(date(DateCondition::NextYear), json!("2025-06-01"), Value::Null));
    assert!(!eval(date(DateCondition::Today), json!("2024-03-14"), Value::Null));
}

#[test]
fn test_date_month_buckets_wrap_year() {
    let january = FilterContext::new(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    let december = FilterContext::new(NaiveDate::from_ymd_opt(2024, 12, 10).unwrap());
    let last = date(DateCondition::LastMonth);
    let next = date(DateCondition::NextMonth);

    assert!(last.evaluate(&json!("2023-12-05"), &Value::Null, true, &january));
    assert!(next.evaluate(&json!("2025-01-05"), &Value::Null, true, &december));
}

#[test]
fn test_unary_conditions() {
    assert!(string(StringCondition::Empty).is_unary());
    assert!(!string(StringCondition::Contains).is_unary());
    assert!(date(DateCondition::Today).is_unary());
    assert!(!date(DateCondition::Before).is_unary());
}

#[test]
fn test_empty_tree_is_noop() {
    let data = rows(json!([{"a": 1}, {"a": 2}]));
    let tree = FilteringExpressionsTree::default();
    assert_eq!(filtering::filter(&data, &[1, 0], &tree, &ctx()), vec![1, 0]);
    assert_eq!(filtering::filter_rows(&data, &tree, &ctx()), data);
}

#[test]
fn test_and_or_groups() {
    let data = rows(json!([
        {"name": "alpha", "qty": 1},
        {"name": "beta", "qty": 5},
        {"name": "gamma", "qty": 10}
    ]));
    let big = FilteringExpression::new("qty", number(NumberCondition::GreaterThan), json!(3));
    let has_m = FilteringExpression::new("name", string(StringCondition::Contains), json!("m"));

    let and = FilteringExpressionsTree::new(FilteringLogic::And)
        .with_expression(big.clone())
        .with_expression(has_m.clone());
    assert_eq!(filtering::filter(&data, &[0, 1, 2], &and, &ctx()), vec![2]);

    let or = FilteringExpressionsTree::new(FilteringLogic::Or)
        .with_expression(big)
        .with_expression(has_m);
    assert_eq!(filtering::filter(&data, &[0, 1, 2], &or, &ctx()), vec![1, 2]);
}

#[test]
fn test_nested_groups() {
    let data = rows(json!([
        {"dept": "X", "qty": 1},
        {"dept": "Y", "qty": 5},
        {"dept": "X", "qty": 7}
    ]));
    let inner = FilteringExpressionsTree::new(FilteringLogic::Or)
        .with_expression(FilteringExpression::new("qty", number(NumberCondition::LessThan), json!(2)))
        .with_expression(FilteringExpression::new("qty", number(NumberCondition::GreaterThan), json!(6)));
    let tree = FilteringExpressionsTree::new(FilteringLogic::And)
        .with_expression(FilteringExpression::new("dept", string(StringCondition::Equals), json!("x")))
        .with_tree(inner);

    assert_eq!(filtering::filter(&data, &[0, 1, 2], &tree, &ctx()), vec![0, 2]);
    assert_eq!(tree.expression_count(), 3);
    assert_eq!(
        tree.referenced_fields().into_iter().collect::<Vec<_>>(),
        vec!["dept".to_string(), "qty".to_string()]
    );
}

#[test]
fn test_empty_or_group_matches_everything() {
    let row: Row = serde_json::from_value(json!({"a": 1})).unwrap();
    let tree = FilteringExpressionsTree::new(FilteringLogic::Or);
    assert!(tree.matches(&row, &ctx()));
}

#[test]
fn test_filter_is_idempotent() {
    let data = rows(json!([
        {"n": "apple"}, {"n": "banana"}, {"n": "cherry"}, {"n": "grape"}
    ]));
    let tree = FilteringExpressionsTree::new(FilteringLogic::And).with_expression(
        FilteringExpression::new("n", string(StringCondition::Contains), json!("a")),
    );
    let all: Vec<usize> = (0..data.len()).collect();

    let once = filtering::filter(&data, &all, &tree, &ctx());
    let twice = filtering::filter(&data, &once, &tree, &ctx());
    assert_eq!(once, twice);
    assert_eq!(once, vec![0, 1, 3]);
}

#[test]
fn test_column_filter_helpers() {
    let mut tree = FilteringExpressionsTree::default();
    let by_name = FilteringExpressionsTree::new(FilteringLogic::And).with_expression(
        FilteringExpression::new("name", string(StringCondition::Contains), json!("a")),
    );
    tree.set_column_filter(by_name, "name");
    assert_eq!(tree.column_filter("name").and_then(|t| t.field_name.as_deref()), Some("name"));

    let replacement = FilteringExpressionsTree::new(FilteringLogic::And).with_expression(
        FilteringExpression::new("name", string(StringCondition::StartsWith), json!("b")),
    );
    tree.set_column_filter(replacement, "name");
    assert_eq!(tree.operands.len(), 1);
    assert_eq!(tree.expression_count(), 1);

    assert!(tree.remove_column_filter("name"));
    assert!(!tree.remove_column_filter("name"));
    assert!(tree.is_empty());
}

#[test]
fn test_tree_serde_roundtrip_keeps_structure() {
    let tree = FilteringExpressionsTree::for_field(FilteringLogic::Or, "qty")
        .with_expression(
            FilteringExpression::new("qty", number(NumberCondition::Equals), json!(1)).case_sensitive(),
        )
        .with_tree(FilteringExpressionsTree::new(FilteringLogic::And));

    let encoded = serde_json::to_value(&tree).unwrap();
    assert_eq!(encoded["operator"], json!("or"));
    assert_eq!(encoded["operands"][0]["kind"], json!("leaf"));
    assert_eq!(encoded["operands"][0]["condition"], json!({"family": "number", "name": "equals"}));
    assert!(matches!(tree.operands[1], FilterNode::Group(_)));

    let decoded: FilteringExpressionsTree = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded, tree);
}
