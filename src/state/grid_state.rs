use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::conditions::{FilterCondition, FilterContext};
use crate::pipeline::filtering::{FilteringExpression, FilteringExpressionsTree, FilteringLogic};
use crate::pipeline::grouping::{GroupId, GroupKey, GroupingExpression, GroupingState};
use crate::pipeline::paging::PagingState;
use crate::pipeline::sorting::{self, SortingDirection, SortingExpression};
use crate::pipeline::{DataPipeline, PipelineInput, PipelineResult};
use crate::state::clipboard::{self, ClipboardOptions};
use crate::state::columns::{ConfigError, DataType, GridConfig};
use crate::state::crud::{
    self, BeginOutcome, CellEditEnterArgs, CellEditSession, CellId, CrudService, EditHost,
    EditListener, RowEditDoneArgs, RowEditEnterArgs, RowEditSession,
};
use crate::state::data_model::{self, Row, RowId, TableData};
use crate::state::selection::{SelectionRange, SelectionService};
use crate::state::transactions::TransactionLog;

const CRUD_TARGET: &str = "gridcore::crud";
const PIPELINE_TARGET: &str = "gridcore::pipeline";

#[derive(Clone, Debug, Default, PartialEq)]
struct History {
    undo_stack: Vec<TableData>,
    redo_stack: Vec<TableData>,
}

impl History {
    fn record(&mut self, data: &TableData) {
        self.undo_stack.push(data.clone());
        self.redo_stack.clear();
    }
}

/// View state that survives a reload: everything the pipeline reads plus the
/// selected ranges.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridStateSnapshot {
    #[serde(default)]
    pub filtering: FilteringExpressionsTree,
    #[serde(default)]
    pub sorting: Vec<SortingExpression>,
    #[serde(default)]
    pub grouping: GroupingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<PagingState>,
    #[serde(default)]
    pub selection: Vec<SelectionRange>,
}

/// One grid instance: configuration, dataset, selection, edit sessions and
/// the cached view.
#[derive(Clone, Debug)]
pub struct GridState {
    config: GridConfig,
    data: TableData,
    selection: SelectionService,
    crud: CrudService,
    transactions: TransactionLog,
    filtering: FilteringExpressionsTree,
    sorting: Vec<SortingExpression>,
    grouping: GroupingState,
    paging: Option<PagingState>,
    pipe_trigger: u64,
    pipeline: DataPipeline,
    history: History,
    search_query: String,
    context: Option<FilterContext>,
}

impl GridState {
    pub fn new(config: GridConfig) -> Result<Self, ConfigError> {
        Self::from_data(config, TableData::new())
    }

    pub fn from_data(config: GridConfig, data: TableData) -> Result<Self, ConfigError> {
        config.validate()?;
        let grouping = GroupingState {
            default_expanded: config.groups_expanded,
            ..GroupingState::default()
        };
        Ok(Self {
            crud: CrudService::new(config.row_editable),
            paging: config.paging,
            grouping,
            data,
            config,
            selection: SelectionService::new(),
            transactions: TransactionLog::new(),
            filtering: FilteringExpressionsTree::default(),
            sorting: Vec::new(),
            pipe_trigger: 0,
            pipeline: DataPipeline::new(),
            history: History::default(),
            search_query: String::new(),
            context: None,
        })
    }

    /// Swaps in a new dataset. Selection, open edits, undo history and
    /// search are reset; filter/sort/group expressions are kept.
    pub fn replace_data(&mut self, data: TableData) {
        self.data = data;
        self.selection.reset();
        self.crud.end();
        self.crud.end_row_edit();
        self.transactions.end_pending(false);
        self.history = History::default();
        self.search_query.clear();
        if let Some(paging) = self.paging.as_mut() {
            paging.index = 0;
        }
        self.notify_data_changed();
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn data(&self) -> &TableData {
        &self.data
    }

    /// Column fields in display order. Falls back to the union of row keys
    /// when no columns are configured.
    pub fn fields(&self) -> Vec<String> {
        if self.config.columns.is_empty() {
            data_model::derive_columns(&self.data)
        } else {
            self.config.fields()
        }
    }

    pub fn pipe_trigger(&self) -> u64 {
        self.pipe_trigger
    }

    /// Marks the dataset as changed so the next [`Self::view`] recomputes.
    pub fn notify_data_changed(&mut self) {
        self.pipe_trigger += 1;
    }

    pub fn can_undo(&self) -> bool {
        !self.history.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.history.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.data, entry);
        self.history.redo_stack.push(current);
        self.discard_edits();
        self.notify_data_changed();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.data, entry);
        self.history.undo_stack.push(current);
        self.discard_edits();
        self.notify_data_changed();
        true
    }

    // Pipeline

    /// Pins the reference date for relative date conditions. `None` uses the
    /// local date at evaluation time.
    pub fn set_filter_context(&mut self, context: Option<FilterContext>) {
        self.context = context;
    }

    pub fn view(&mut self) -> &PipelineResult {
        let context = self.context.unwrap_or_else(FilterContext::now);
        self.pipeline.run(PipelineInput {
            data: &self.data,
            pipe_trigger: self.pipe_trigger,
            filtering: &self.filtering,
            sorting: &self.sorting,
            grouping: &self.grouping,
            paging: self.paging,
            context,
        })
    }

    /// Owned copies of the data rows on the current page.
    pub fn visible_rows(&mut self) -> Vec<Row> {
        self.view();
        self.pipeline.result().rows(&self.data)
    }

    pub fn visible_row_indices(&mut self) -> Vec<usize> {
        self.view().data_indices()
    }

    /// Dataset index of the `visible_row`-th data row on the current page.
    pub fn data_index_at(&mut self, visible_row: usize) -> Option<usize> {
        self.view().data_indices().get(visible_row).copied()
    }

    pub fn filtering(&self) -> &FilteringExpressionsTree {
        &self.filtering
    }

    pub fn sorting(&self) -> &[SortingExpression] {
        &self.sorting
    }

    pub fn grouping(&self) -> &GroupingState {
        &self.grouping
    }

    pub fn paging(&self) -> Option<PagingState> {
        self.paging
    }

    /// Adds, replaces, or (with `dir = None`) removes the sort key for the
    /// expression's field.
    pub fn sort(&mut self, expr: SortingExpression) -> bool {
        if self.config.column(&expr.field_name).is_some_and(|c| !c.sortable) {
            tracing::warn!(target: PIPELINE_TARGET, field = %expr.field_name, "column is not sortable");
            return false;
        }
        let changed = sorting::upsert_expression(&mut self.sorting, expr);
        if changed {
            tracing::debug!(target: PIPELINE_TARGET, keys = self.sorting.len(), "sorting changed");
        }
        changed
    }

    /// Header-click behavior: unsorted goes ascending, then toggles.
    pub fn sort_by_column_toggle(&mut self, field: &str) -> bool {
        let dir = self
            .sorting
            .iter()
            .find(|e| e.field_name == field)
            .map(|e| e.dir.toggle())
            .unwrap_or(SortingDirection::Asc);
        self.sort(SortingExpression::new(field, dir))
    }

    pub fn clear_sort(&mut self, field: Option<&str>) -> bool {
        let before = self.sorting.len();
        match field {
            Some(field) => self.sorting.retain(|e| e.field_name != field),
            None => self.sorting.clear(),
        }
        before != self.sorting.len()
    }

    /// Replaces the filter for `field` with a single condition.
    pub fn filter(
        &mut self,
        field: &str,
        condition: FilterCondition,
        search_value: Value,
        ignore_case: bool,
    ) -> bool {
        if self.config.column(field).is_some_and(|c| !c.filterable) {
            tracing::warn!(target: PIPELINE_TARGET, field, "column is not filterable");
            return false;
        }
        let mut expr = FilteringExpression::new(field, condition, search_value);
        expr.ignore_case = ignore_case;
        let tree = FilteringExpressionsTree::for_field(FilteringLogic::And, field).with_expression(expr);
        if self.filtering.column_filter(field) == Some(&tree) {
            return false;
        }
        self.filtering.set_column_filter(tree, field);
        self.reset_page_index();
        true
    }

    pub fn set_filtering_tree(&mut self, tree: FilteringExpressionsTree) -> bool {
        if self.filtering == tree {
            return false;
        }
        self.filtering = tree;
        self.reset_page_index();
        true
    }

    /// Clears one column's filter, or every filter with `None`.
    pub fn clear_filter(&mut self, field: Option<&str>) -> bool {
        let changed = match field {
            Some(field) => self.filtering.remove_column_filter(field),
            None => {
                let had_filters = !self.filtering.is_empty();
                self.filtering = FilteringExpressionsTree::default();
                had_filters
            }
        };
        if changed {
            self.reset_page_index();
        }
        changed
    }

    /// Adds or updates a grouping level. `dir = None` removes it.
    pub fn group_by(&mut self, expr: GroupingExpression) -> bool {
        if self.config.column(&expr.field_name).is_some_and(|c| !c.groupable) {
            tracing::warn!(target: PIPELINE_TARGET, field = %expr.field_name, "column is not groupable");
            return false;
        }
        let changed = sorting::upsert_expression(&mut self.grouping.expressions, expr);
        if changed {
            self.grouping.prune_expansion();
            tracing::debug!(target: PIPELINE_TARGET, levels = self.grouping.expressions.len(), "grouping changed");
        }
        changed
    }

    pub fn clear_grouping(&mut self, field: Option<&str>) -> bool {
        let before = self.grouping.expressions.len();
        match field {
            Some(field) => self.grouping.expressions.retain(|e| e.field_name != field),
            None => self.grouping.expressions.clear(),
        }
        let changed = before != self.grouping.expressions.len();
        if changed {
            self.grouping.prune_expansion();
        }
        changed
    }

    /// Flips a group's expansion. Returns the new state.
    pub fn toggle_group(&mut self, hierarchy: &[GroupKey]) -> bool {
        self.grouping.toggle(hierarchy)
    }

    pub fn set_group_expanded(&mut self, hierarchy: &[GroupKey], expanded: bool) -> bool {
        self.grouping.set_expanded(hierarchy, expanded)
    }

    /// Expands or collapses every group, dropping per-group overrides.
    pub fn set_groups_expanded(&mut self, expanded: bool) {
        self.grouping.default_expanded = expanded;
        self.grouping.expansion.clear();
    }

    pub fn group_hierarchy(&mut self, id: GroupId) -> Vec<GroupKey> {
        self.view().hierarchy(id)
    }

    pub fn is_row_in_group(&mut self, row_index: usize, id: GroupId) -> bool {
        self.view()
            .group(id)
            .is_some_and(|g| g.records.contains(&row_index))
    }

    pub fn enable_paging(&mut self, records_per_page: usize) -> bool {
        if records_per_page == 0 {
            tracing::warn!(target: PIPELINE_TARGET, "records per page must be greater than zero");
            return false;
        }
        self.paging = Some(PagingState::new(0, records_per_page));
        true
    }

    pub fn disable_paging(&mut self) {
        self.paging = None;
    }

    /// Moves to `index` if it names an existing page.
    pub fn paginate(&mut self, index: usize) -> bool {
        if self.paging.is_none() || index >= self.total_pages() {
            return false;
        }
        match self.paging.as_mut() {
            Some(paging) if paging.index != index => {
                paging.index = index;
                true
            }
            _ => false,
        }
    }

    pub fn next_page(&mut self) -> bool {
        match self.paging {
            Some(paging) => self.paginate(paging.index.saturating_add(1)),
            None => false,
        }
    }

    pub fn previous_page(&mut self) -> bool {
        match self.paging {
            Some(paging) if paging.index > 0 => self.paginate(paging.index - 1),
            _ => false,
        }
    }

    /// Changes the page size and goes back to the first page.
    pub fn set_per_page(&mut self, records_per_page: usize) -> bool {
        if records_per_page == 0 {
            tracing::warn!(target: PIPELINE_TARGET, "records per page must be greater than zero");
            return false;
        }
        match self.paging.as_mut() {
            Some(paging) => {
                paging.records_per_page = records_per_page;
                paging.index = 0;
                true
            }
            None => false,
        }
    }

    pub fn total_pages(&mut self) -> usize {
        self.view().page.map(|meta| meta.count_pages).unwrap_or(1)
    }

    /// Record count before paging, group headers included.
    pub fn total_records(&mut self) -> usize {
        self.view().total_records
    }

    pub fn is_first_page(&self) -> bool {
        self.paging.map(|p| p.index == 0).unwrap_or(true)
    }

    pub fn is_last_page(&mut self) -> bool {
        let Some(paging) = self.paging else {
            return true;
        };
        match self.view().page {
            Some(meta) => meta.is_last_page(paging.index),
            None => true,
        }
    }

    // Search

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search(&mut self, query: &str) {
        self.search_query = query.trim().to_string();
    }

    pub fn cell_matches_search(&self, row_index: usize, field: &str) -> bool {
        if self.search_query.is_empty() {
            return false;
        }

        let Some(row) = self.data.get(row_index) else {
            return false;
        };

        let needle = self.search_query.to_lowercase();
        data_model::display_value(data_model::field_value(row, field))
            .to_lowercase()
            .contains(&needle)
    }

    // Selection

    pub fn selection(&self) -> &SelectionService {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionService {
        &mut self.selection
    }

    /// Selected ranges rendered as delimited text over the visible data rows.
    pub fn selection_text(&mut self, options: &ClipboardOptions) -> String {
        let fields = self.fields();
        let ranges = self.selection.ranges();
        self.view();
        let rows = self.pipeline.result().data_rows(&self.data);
        clipboard::selection_to_text(&ranges, &rows, &fields, options)
    }

    // Editing

    pub fn crud(&self) -> &CrudService {
        &self.crud
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    /// Opens an edit session on a cell. `row_index` is a dataset index and
    /// `column_index` a position in the configured columns. A cell already in
    /// edit elsewhere is committed first.
    pub fn begin_edit(
        &mut self,
        row_index: usize,
        column_index: usize,
        listener: &mut dyn EditListener,
    ) -> BeginOutcome {
        let Some(column) = self.config.column_at(column_index).cloned() else {
            tracing::warn!(target: CRUD_TARGET, column_index, "edit requested for unknown column");
            return BeginOutcome::Cancelled;
        };
        if !column.editable {
            tracing::warn!(target: CRUD_TARGET, field = %column.field, "edit requested for read-only column");
            return BeginOutcome::Cancelled;
        }
        let Some(base) = self.data.get(row_index) else {
            tracing::warn!(target: CRUD_TARGET, row_index, "edit requested for unknown row");
            return BeginOutcome::Cancelled;
        };

        let row_id = data_model::row_id(base, row_index, self.config.primary_key.as_deref());
        let row_data = self
            .transactions
            .aggregated_value(&row_id, base)
            .unwrap_or_else(|| base.clone());
        let id = CellId {
            row_id,
            column_id: column_index,
            row_index,
        };

        if self.crud.same_cell(&id) {
            return BeginOutcome::AlreadyEditing;
        }
        if self.crud.cell().is_some() {
            self.commit_cell(listener);
        }

        let session = CellEditSession::new(id, column, row_data);
        let mut host = Host {
            data: &mut self.data,
            transactions: &mut self.transactions,
            history: &mut self.history,
            pipe_trigger: &mut self.pipe_trigger,
            primary_key: self.config.primary_key.as_deref(),
            listener,
        };
        self.crud.begin(session, &mut host)
    }

    /// Replaces the pending value of the cell in edit.
    pub fn set_edit_value(&mut self, value: Value) -> bool {
        match self.crud.cell_mut() {
            Some(cell) => {
                cell.edit_value = value;
                true
            }
            None => false,
        }
    }

    /// Leaves cell edit mode. With `commit`, the cast value is written to the
    /// open row transaction, or straight to the dataset without one.
    pub fn end_edit(&mut self, commit: bool, listener: &mut dyn EditListener) -> bool {
        if commit {
            self.commit_cell(listener)
        } else {
            self.crud.end().is_some()
        }
    }

    /// Leaves row edit mode, ending the cell edit the same way first.
    pub fn end_row_edit(&mut self, commit: bool, listener: &mut dyn EditListener) -> bool {
        self.end_edit(commit, listener);
        let Some(row) = self.crud.end_row_edit() else {
            return false;
        };
        let mut host = Host {
            data: &mut self.data,
            transactions: &mut self.transactions,
            history: &mut self.history,
            pipe_trigger: &mut self.pipe_trigger,
            primary_key: self.config.primary_key.as_deref(),
            listener,
        };
        host.end_row_transaction(row, commit);
        true
    }

    /// Writes a value outside any edit session, with the same numeric
    /// coercion an editor applies.
    pub fn set_cell_value(&mut self, row_index: usize, field: &str, value: Value) -> bool {
        let value = match self.config.column(field) {
            Some(column) if column.data_type == DataType::Number && !column.has_editor_template => {
                crud::coerce_numeric(&value)
            }
            Some(_) => value,
            None if self.config.columns.is_empty() => value,
            None => {
                tracing::warn!(target: CRUD_TARGET, field, "write to unknown column");
                return false;
            }
        };
        write_cell(
            &mut self.data,
            &mut self.history,
            &mut self.pipe_trigger,
            row_index,
            field,
            value,
        )
    }

    // Persisted view state

    pub fn snapshot_state(&self) -> GridStateSnapshot {
        GridStateSnapshot {
            filtering: self.filtering.clone(),
            sorting: self.sorting.clone(),
            grouping: self.grouping.clone(),
            paging: self.paging,
            selection: self.selection.ranges(),
        }
    }

    pub fn restore_state(&mut self, snapshot: GridStateSnapshot) {
        self.filtering = snapshot.filtering;
        self.sorting = snapshot.sorting;
        self.grouping = snapshot.grouping;
        self.paging = snapshot.paging.filter(|p| p.records_per_page > 0);
        self.selection.reset();
        for range in snapshot.selection {
            self.selection.select_range(range);
        }
        self.clamp_page_index();
    }

    fn commit_cell(&mut self, listener: &mut dyn EditListener) -> bool {
        let Some(cell) = self.crud.end() else {
            return false;
        };
        let args = cell.done_args();
        let value = args.new_value.clone();

        if self.crud.row().is_some() && self.transactions.is_pending() {
            self.transactions
                .add(cell.id.row_id.clone(), &cell.column.field, value);
        } else {
            write_cell(
                &mut self.data,
                &mut self.history,
                &mut self.pipe_trigger,
                cell.row_index,
                &cell.column.field,
                value,
            );
        }
        tracing::debug!(target: CRUD_TARGET, row = %cell.id.row_id, field = %cell.column.field, "cell edit committed");
        listener.cell_edit_done(&args);
        true
    }

    fn discard_edits(&mut self) {
        self.crud.end();
        self.crud.end_row_edit();
        self.transactions.end_pending(false);
    }

    /// Moves a stale page index onto the last existing page.
    fn clamp_page_index(&mut self) {
        let Some(index) = self.paging.map(|p| p.index) else {
            return;
        };
        let last = self.total_pages().saturating_sub(1);
        if index > last {
            tracing::warn!(target: PIPELINE_TARGET, index, last, "restored page index out of range");
            if let Some(paging) = self.paging.as_mut() {
                paging.index = last;
            }
        }
    }

    fn reset_page_index(&mut self) {
        if let Some(paging) = self.paging.as_mut() {
            paging.index = 0;
        }
    }
}

struct Host<'a> {
    data: &'a mut TableData,
    transactions: &'a mut TransactionLog,
    history: &'a mut History,
    pipe_trigger: &'a mut u64,
    primary_key: Option<&'a str>,
    listener: &'a mut dyn EditListener,
}

impl EditHost for Host<'_> {
    fn cell_edit_enter(&mut self, args: &mut CellEditEnterArgs) {
        self.listener.cell_edit_enter(args);
    }

    fn row_edit_enter(&mut self, args: &mut RowEditEnterArgs) {
        self.listener.row_edit_enter(args);
    }

    fn row_transaction_state(&self, row: &RowEditSession) -> Option<Row> {
        self.transactions.aggregated_value(&row.id, &row.data)
    }

    fn start_row_transaction(&mut self) {
        self.transactions.start_pending();
    }

    fn end_row_transaction(&mut self, row: RowEditSession, commit: bool) {
        let changes = self.transactions.end_pending(commit);
        let mut new_value = row.data.clone();
        if let Some(fields) = changes.get(&row.id) {
            new_value.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        if apply_changes(self.data, self.history, changes, self.primary_key) {
            *self.pipe_trigger += 1;
        }
        tracing::debug!(target: CRUD_TARGET, row = %row.id, commit, "row edit ended");
        self.listener.row_edit_done(&RowEditDoneArgs {
            row_id: row.id,
            old_value: row.data,
            new_value,
            committed: commit,
        });
    }
}

fn write_cell(
    data: &mut TableData,
    history: &mut History,
    pipe_trigger: &mut u64,
    row_index: usize,
    field: &str,
    value: Value,
) -> bool {
    let Some(row) = data.get(row_index) else {
        return false;
    };
    if row.get(field) == Some(&value) {
        return false;
    }

    history.record(data);
    data_model::set_cell_value(data, row_index, field, value);
    *pipe_trigger += 1;
    true
}

fn apply_changes(
    data: &mut TableData,
    history: &mut History,
    changes: BTreeMap<RowId, Row>,
    primary_key: Option<&str>,
) -> bool {
    let mut next = data.clone();
    for (id, fields) in changes {
        let Some(idx) = index_of(&next, &id, primary_key) else {
            tracing::warn!(target: CRUD_TARGET, row = %id, "pending changes for unknown row dropped");
            continue;
        };
        next[idx].extend(fields);
    }

    if next == *data {
        return false;
    }
    history.record(data);
    *data = next;
    true
}

fn index_of(data: &TableData, id: &RowId, primary_key: Option<&str>) -> Option<usize> {
    match id {
        RowId::Index(idx) => (*idx < data.len()).then_some(*idx),
        RowId::Key(_) => data
            .iter()
            .enumerate()
            .position(|(idx, row)| data_model::row_id(row, idx, primary_key) == *id),
    }
}
