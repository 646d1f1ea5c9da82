//! The row pipeline: filter → sort → group → page.
//!
//! Stages work on indices into the base dataset, so rows are never copied or
//! mutated. [`DataPipeline`] memoizes every stage and re-runs one only when
//! its own inputs, the upstream stage, or the caller's pipe trigger change.

pub mod conditions;
pub mod filtering;
pub mod grouping;
pub mod paging;
pub mod sorting;

use chrono::NaiveDate;

use crate::pipeline::conditions::FilterContext;
use crate::pipeline::filtering::FilteringExpressionsTree;
use crate::pipeline::grouping::{
    GridRecord, GroupByResult, GroupId, GroupKey, GroupRecord, GroupingState,
};
use crate::pipeline::paging::{PageMeta, PagingState};
use crate::pipeline::sorting::SortingExpression;
use crate::state::data_model::Row;

const TARGET: &str = "gridcore::pipeline";

pub struct PipelineInput<'a> {
    pub data: &'a [Row],
    /// Bumped by the owner whenever `data` changes in place.
    pub pipe_trigger: u64,
    pub filtering: &'a FilteringExpressionsTree,
    pub sorting: &'a [SortingExpression],
    pub grouping: &'a GroupingState,
    /// `None` disables paging.
    pub paging: Option<PagingState>,
    pub context: FilterContext,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineResult {
    /// Visible records of the current page, group headers included.
    pub records: Vec<GridRecord>,
    /// Parallel to `records`, see [`GroupByResult::metadata`].
    pub metadata: Vec<Option<GroupId>>,
    pub groups: Vec<GroupRecord>,
    /// Data rows surviving the filter stage.
    pub filtered_count: usize,
    /// Pre-paging record count (headers included).
    pub total_records: usize,
    pub page: Option<PageMeta>,
}

impl PipelineResult {
    pub fn data_indices(&self) -> Vec<usize> {
        self.records.iter().filter_map(GridRecord::data_index).collect()
    }

    pub fn data_rows<'a>(&self, data: &'a [Row]) -> Vec<&'a Row> {
        self.records
            .iter()
            .filter_map(GridRecord::data_index)
            .filter_map(|idx| data.get(idx))
            .collect()
    }

    /// Owned copies of the visible data rows, headers skipped.
    pub fn rows(&self, data: &[Row]) -> Vec<Row> {
        self.data_rows(data).into_iter().cloned().collect()
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupRecord> {
        self.groups.get(id)
    }

    pub fn hierarchy(&self, id: GroupId) -> Vec<GroupKey> {
        grouping::group_hierarchy(&self.groups, id)
    }
}

/// Grouping keys lead the effective sort so groups form contiguous runs;
/// explicit sort keys on grouped fields are dropped.
pub fn effective_sorting(
    grouping: &GroupingState,
    sorting: &[SortingExpression],
) -> Vec<SortingExpression> {
    let mut out = grouping.expressions.clone();
    out.extend(
        sorting
            .iter()
            .filter(|s| !grouping.expressions.iter().any(|g| g.field_name == s.field_name))
            .cloned(),
    );
    out
}

#[derive(Clone, Debug)]
struct Stage<K, T> {
    key: Option<K>,
    output: T,
    generation: u64,
}

impl<K: PartialEq, T: Default> Default for Stage<K, T> {
    fn default() -> Self {
        Self {
            key: None,
            output: T::default(),
            generation: 0,
        }
    }
}

impl<K: PartialEq, T> Stage<K, T> {
    fn refresh(&mut self, key: K, compute: impl FnOnce() -> T) -> bool {
        if self.key.as_ref() == Some(&key) {
            return false;
        }
        self.output = compute();
        self.key = Some(key);
        self.generation += 1;
        true
    }
}

type PagedRecords = (Vec<(GridRecord, Option<GroupId>)>, Option<PageMeta>);

#[derive(Clone, Debug, Default)]
pub struct DataPipeline {
    filter: Stage<(u64, usize, FilteringExpressionsTree, NaiveDate), Vec<usize>>,
    sort: Stage<(u64, Vec<SortingExpression>), Vec<usize>>,
    group: Stage<(u64, GroupingState), GroupByResult>,
    page: Stage<(u64, Option<PagingState>), PagedRecords>,
    result: PipelineResult,
}

impl DataPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings every stale stage up to date and returns the final view.
    pub fn run(&mut self, input: PipelineInput<'_>) -> &PipelineResult {
        let data = input.data;

        let filter_key = (
            input.pipe_trigger,
            data.len(),
            input.filtering.clone(),
            input.context.today,
        );
        if self.filter.refresh(filter_key, || {
            let all: Vec<usize> = (0..data.len()).collect();
            filtering::filter(data, &all, input.filtering, &input.context)
        }) {
            tracing::debug!(target: TARGET, stage = "filter", rows = self.filter.output.len(), "stage recomputed");
        }

        let sort_keys = effective_sorting(input.grouping, input.sorting);
        let filtered = &self.filter.output;
        if self.sort.refresh((self.filter.generation, sort_keys.clone()), || {
            sorting::sort(data, filtered, &sort_keys)
        }) {
            tracing::debug!(target: TARGET, stage = "sort", keys = sort_keys.len(), "stage recomputed");
        }

        let sorted = &self.sort.output;
        if self.group.refresh((self.sort.generation, input.grouping.clone()), || {
            grouping::group(data, sorted, input.grouping)
        }) {
            tracing::debug!(target: TARGET, stage = "group", groups = self.group.output.groups.len(), "stage recomputed");
        }

        let grouped = &self.group.output;
        let page_changed = self.page.refresh((self.group.generation, input.paging), || {
            let pairs: Vec<(GridRecord, Option<GroupId>)> = grouped
                .data
                .iter()
                .copied()
                .zip(grouped.metadata.iter().copied())
                .collect();
            match input.paging {
                Some(state) => {
                    let (page, meta) = paging::page(&pairs, &state);
                    (page, Some(meta))
                }
                None => (pairs, None),
            }
        });

        if page_changed {
            tracing::debug!(target: TARGET, stage = "page", records = self.page.output.0.len(), "stage recomputed");
            let (records, metadata): (Vec<GridRecord>, Vec<Option<GroupId>>) =
                self.page.output.0.iter().copied().unzip();
            self.result = PipelineResult {
                records,
                metadata,
                groups: self.group.output.groups.clone(),
                filtered_count: self.filter.output.len(),
                total_records: self.group.output.data.len(),
                page: self.page.output.1,
            };
        }
        &self.result
    }

    /// The last computed view without re-running anything.
    pub fn result(&self) -> &PipelineResult {
        &self.result
    }

    /// Forgets all cached stage output.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}
