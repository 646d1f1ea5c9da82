use serde_json::{json, Value};

use gridcore::pipeline::grouping::{self, GridRecord, GroupKey, GroupingState};
use gridcore::pipeline::sorting::{self, SortingDirection, SortingExpression};
use gridcore::state::data_model::TableData;

fn rows(value: Value) -> TableData {
    serde_json::from_value(value).unwrap()
}

fn departments() -> TableData {
    rows(json!([
        {"id": 1, "dept": "X", "team": "a"},
        {"id": 2, "dept": "Y", "team": "b"},
        {"id": 3, "dept": "X", "team": "b"},
        {"id": 4, "dept": "Y", "team": "b"},
        {"id": 5, "dept": "X", "team": "a"}
    ]))
}

fn state(fields: &[&str]) -> GroupingState {
    GroupingState {
        expressions: fields
            .iter()
            .map(|f| SortingExpression::new(*f, SortingDirection::Asc))
            .collect(),
        ..GroupingState::default()
    }
}

fn sorted(data: &TableData, state: &GroupingState) -> Vec<usize> {
    let all: Vec<usize> = (0..data.len()).collect();
    sorting::sort(data, &all, &state.expressions)
}

fn key(field: &str, value: &str) -> GroupKey {
    GroupKey {
        field_name: field.to_string(),
        value: json!(value),
    }
}

#[test]
fn test_empty_grouping_is_passthrough() {
    let data = departments();
    let result = grouping::group(&data, &[4, 2, 0], &GroupingState::default());
    assert_eq!(
        result.data,
        vec![GridRecord::Data(4), GridRecord::Data(2), GridRecord::Data(0)]
    );
    assert_eq!(result.metadata, vec![None, None, None]);
    assert!(result.groups.is_empty());
}

#[test]
fn test_single_level_groups_with_headers() {
    let data = departments();
    let state = state(&["dept"]);
    let result = grouping::group(&data, &sorted(&data, &state), &state);

    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[0].value, json!("X"));
    assert_eq!(result.groups[0].records, vec![0, 2, 4]);
    assert_eq!(result.groups[1].records, vec![1, 3]);

    assert_eq!(
        result.data,
        vec![
            GridRecord::Group(0),
            GridRecord::Data(0),
            GridRecord::Data(2),
            GridRecord::Data(4),
            GridRecord::Group(1),
            GridRecord::Data(1),
            GridRecord::Data(3),
        ]
    );
    assert_eq!(result.metadata[0], Some(0));
    assert_eq!(result.metadata[5], Some(1));
    assert!(result.data[0].is_group_header());
}

#[test]
fn test_collapsing_group_hides_its_rows_but_keeps_header() {
    let data = departments();
    let mut state = state(&["dept"]);
    assert!(state.set_expanded(&[key("dept", "Y")], false));

    let result = grouping::group(&data, &sorted(&data, &state), &state);
    let data_rows: Vec<usize> = result.data.iter().filter_map(GridRecord::data_index).collect();
    assert_eq!(data_rows, vec![0, 2, 4]);
    assert_eq!(result.data.last(), Some(&GridRecord::Group(1)));
    assert_eq!(result.metadata.last(), Some(&Some(1)));
    assert_eq!(result.groups[1].records, vec![1, 3]);
}

#[test]
fn test_default_collapsed_with_override() {
    let data = departments();
    let mut state = state(&["dept"]);
    state.default_expanded = false;
    state.set_expanded(&[key("dept", "X")], true);

    let result = grouping::group(&data, &sorted(&data, &state), &state);
    assert_eq!(
        result.data,
        vec![
            GridRecord::Group(0),
            GridRecord::Data(0),
            GridRecord::Data(2),
            GridRecord::Data(4),
            GridRecord::Group(1),
        ]
    );
}

#[test]
fn test_multi_level_grouping() {
    let data = departments();
    let state = state(&["dept", "team"]);
    let result = grouping::group(&data, &sorted(&data, &state), &state);

    let roots: Vec<usize> = result.root_groups().collect();
    assert_eq!(roots.len(), 2);
    let x = &result.groups[roots[0]];
    assert_eq!(x.groups.len(), 2);
    let xa = &result.groups[x.groups[0]];
    assert_eq!(xa.level, 1);
    assert_eq!(xa.records, vec![0, 4]);
    assert_eq!(xa.parent, Some(roots[0]));

    assert_eq!(
        result.hierarchy(x.groups[0]),
        vec![key("dept", "X"), key("team", "a")]
    );
    assert_eq!(result.find_group(&[key("dept", "Y"), key("team", "b")]), Some(result.groups[roots[1]].groups[0]));

    assert!(result.is_row_in_group(4, roots[0]));
    assert!(result.is_row_in_group(4, x.groups[0]));
    assert!(!result.is_row_in_group(2, x.groups[0]));

    // 2 top headers + 3 sub headers + 5 rows
    assert_eq!(result.data.len(), 10);
}

#[test]
fn test_collapsed_parent_hides_subgroups() {
    let data = departments();
    let mut state = state(&["dept", "team"]);
    state.toggle(&[key("dept", "X")]);

    let result = grouping::group(&data, &sorted(&data, &state), &state);
    let headers = result.data.iter().filter(|r| r.is_group_header()).count();
    assert_eq!(headers, 3);
    assert_eq!(
        result.data.iter().filter_map(GridRecord::data_index).collect::<Vec<_>>(),
        vec![1, 3]
    );
}

#[test]
fn test_case_insensitive_grouping_merges_values() {
    let data = rows(json!([
        {"id": 1, "c": "abc"},
        {"id": 2, "c": "ABC"},
        {"id": 3, "c": "def"}
    ]));
    let state = state(&["c"]);
    let result = grouping::group(&data, &sorted(&data, &state), &state);
    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[0].records, vec![0, 1]);
}

#[test]
fn test_toggle_and_prune_expansion() {
    let mut state = state(&["dept", "team"]);
    assert!(!state.toggle(&[key("dept", "X")]));
    assert!(!state.is_expanded(&[key("dept", "X")]));
    assert!(state.toggle(&[key("dept", "X")]));
    assert!(!state.set_expanded(&[key("dept", "X")], true));

    state.set_expanded(&[key("dept", "X"), key("team", "a")], false);
    state.expressions.truncate(1);
    state.prune_expansion();
    assert_eq!(state.expansion.len(), 1);
}
