//! Cell and range selection for the grid body.
//!
//! [`SelectionService`] keeps two maps of `row -> columns`: the committed
//! selection and a temporary map filled while a ctrl-drag is in progress. The
//! temporary map is merged into the committed one when the pointer is
//! released. Every gesture that produces a rectangle also records it in a
//! deduplicated set of [`SelectionRange`]s, which is what clipboard export
//! and range highlighting read through [`SelectionService::ranges`].
//!
//! Keyboard and pointer gestures each carry their own transient state. Only
//! one of them can be in flight at a time, so both live behind a single
//! [`Interaction`] slot: starting a pointer gesture drops any keyboard state
//! and vice versa.
//!
//! Coordinates are trusted. Bounds checking against the rendered rows and
//! columns is the caller's job; unknown coordinates are simply absent from the
//! maps.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

const TARGET: &str = "gridcore::selection";

/// A cell in visible grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: usize,
    pub column: usize,
}

impl CellCoord {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// A normalized rectangle: `row_start <= row_end` and
/// `column_start <= column_end` always hold.
///
/// Field order defines the derived ordering, which is what keeps the range
/// set canonical.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectionRange {
    pub row_start: usize,
    pub row_end: usize,
    pub column_start: usize,
    pub column_end: usize,
}

impl SelectionRange {
    pub fn single(cell: CellCoord) -> Self {
        Self::between(cell, cell)
    }

    pub fn between(a: CellCoord, b: CellCoord) -> Self {
        Self {
            row_start: a.row.min(b.row),
            row_end: a.row.max(b.row),
            column_start: a.column.min(b.column),
            column_end: a.column.max(b.column),
        }
    }

    pub fn contains(&self, cell: CellCoord) -> bool {
        (self.row_start..=self.row_end).contains(&cell.row)
            && (self.column_start..=self.column_end).contains(&cell.column)
    }

    pub fn row_count(&self) -> usize {
        self.row_end - self.row_start + 1
    }

    pub fn column_count(&self) -> usize {
        self.column_end - self.column_start + 1
    }

    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (self.row_start..=self.row_end).flat_map(move |row| {
            (self.column_start..=self.column_end).map(move |column| CellCoord { row, column })
        })
    }
}

/// Row index to selected column indices.
pub type SelectionMap = BTreeMap<usize, BTreeSet<usize>>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyboardInteraction {
    /// Where the shift-navigation started.
    pub node: Option<CellCoord>,
    pub shift: bool,
    pub range: Option<SelectionRange>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointerInteraction {
    pub node: Option<CellCoord>,
    pub shift: bool,
    pub ctrl: bool,
    pub range: Option<SelectionRange>,
    /// Set once a pointer-enter arrives with the primary button held.
    pub dragging: bool,
}

/// The in-flight gesture. Holding it in one slot makes the "only one input
/// modality is active" rule structural.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interaction {
    Keyboard(KeyboardInteraction),
    Pointer(PointerInteraction),
}

#[derive(Clone, Debug, Default)]
pub struct SelectionService {
    selection: SelectionMap,
    temp: SelectionMap,
    ranges: BTreeSet<SelectionRange>,
    active: Option<CellCoord>,
    interaction: Option<Interaction>,
    /// The pointer-down happened on a grid cell, so a plain release selects it.
    pointer_in_body: bool,
}

impl SelectionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<CellCoord> {
        self.active
    }

    pub fn set_active(&mut self, cell: Option<CellCoord>) {
        self.active = cell;
    }

    pub fn is_active(&self, cell: CellCoord) -> bool {
        self.active == Some(cell)
    }

    pub fn selection(&self) -> &SelectionMap {
        &self.selection
    }

    pub fn temp(&self) -> &SelectionMap {
        &self.temp
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        self.interaction.as_ref()
    }

    pub fn keyboard_state(&self) -> Option<&KeyboardInteraction> {
        match self.interaction.as_ref() {
            Some(Interaction::Keyboard(state)) => Some(state),
            _ => None,
        }
    }

    pub fn pointer_state(&self) -> Option<&PointerInteraction> {
        match self.interaction.as_ref() {
            Some(Interaction::Pointer(state)) => Some(state),
            _ => None,
        }
    }

    /// Marks a single cell selected and records its 1x1 range. Returns whether
    /// the cell was newly added.
    pub fn add(&mut self, cell: CellCoord) -> bool {
        let added = insert_cell(&mut self.selection, cell);
        self.ranges.insert(SelectionRange::single(cell));
        added
    }

    pub fn remove(&mut self, cell: CellCoord) -> bool {
        let mut removed = false;
        if let Some(columns) = self.selection.get_mut(&cell.row) {
            removed = columns.remove(&cell.column);
            if columns.is_empty() {
                self.selection.remove(&cell.row);
            }
        }
        if self.is_active(cell) {
            self.active = None;
        }
        self.ranges.remove(&SelectionRange::single(cell));
        removed
    }

    /// Committed or in-drag membership only.
    pub fn is_in_map(&self, cell: CellCoord) -> bool {
        map_contains(&self.selection, cell) || map_contains(&self.temp, cell)
    }

    pub fn is_selected(&self, cell: CellCoord) -> bool {
        self.is_active(cell) || self.is_in_map(cell)
    }

    /// The degenerate range at `cell` without an anchor, otherwise the
    /// rectangle spanned by `cell` and the anchor.
    pub fn generate_range(&self, cell: CellCoord, anchor: Option<CellCoord>) -> SelectionRange {
        match anchor {
            Some(node) => SelectionRange::between(cell, node),
            None => SelectionRange::single(cell),
        }
    }

    /// Fills the committed selection with the rectangle between `cell` and
    /// `anchor`.
    pub fn select_range_from(&mut self, cell: CellCoord, anchor: CellCoord) {
        fill_range(&mut self.selection, SelectionRange::between(cell, anchor));
    }

    /// Like [`Self::select_range_from`], but replaces the committed selection
    /// unless ctrl is held by the current pointer gesture.
    pub fn drag_select(&mut self, cell: CellCoord, anchor: CellCoord) {
        let ctrl = self.pointer_state().is_some_and(|p| p.ctrl);
        if !ctrl {
            self.selection.clear();
        }
        self.select_range_from(cell, anchor);
    }

    /// Selects a rectangle programmatically and records it.
    pub fn select_range(&mut self, range: SelectionRange) {
        fill_range(&mut self.selection, range);
        self.ranges.insert(range);
    }

    pub fn keyboard_state_on_keydown(&mut self, cell: CellCoord, shift: bool, shift_tab: bool) {
        let mut state = match self.interaction.take() {
            Some(Interaction::Keyboard(state)) => state,
            _ => KeyboardInteraction::default(),
        };
        state.shift = shift && !shift_tab;

        if state.shift && state.node.is_none() {
            self.clear();
            state.node = Some(cell);
        }
        tracing::trace!(target: TARGET, ?cell, shift = state.shift, "keyboard keydown");
        self.interaction = Some(Interaction::Keyboard(state));
    }

    /// Focus moved to `cell` as a result of keyboard navigation. Returns the
    /// range to announce when shift is held.
    pub fn keyboard_state_on_focus(&mut self, cell: CellCoord) -> Option<SelectionRange> {
        let Some(Interaction::Keyboard(state)) = self.interaction.as_ref() else {
            return None;
        };

        if let (true, Some(anchor)) = (state.shift, state.node) {
            self.drag_select(cell, anchor);
            let range = self.generate_range(cell, Some(anchor));
            if let Some(Interaction::Keyboard(state)) = self.interaction.as_mut() {
                state.range = Some(range);
            }
            tracing::trace!(target: TARGET, ?range, "keyboard range");
            return Some(range);
        }

        self.interaction = None;
        self.clear();
        self.add(cell);
        None
    }

    pub fn pointer_down(&mut self, cell: CellCoord, shift: bool, ctrl: bool) {
        self.commit_keyboard_range();
        let previous_node = self.pointer_state().and_then(|p| p.node);
        let mut state = PointerInteraction {
            node: previous_node,
            shift,
            ctrl,
            ..PointerInteraction::default()
        };
        self.pointer_in_body = true;

        if !ctrl {
            self.clear();
        }

        if shift {
            // No previously clicked node: anchor on the focused cell.
            state.node = state.node.or(self.active).or(Some(cell));
            self.interaction = Some(Interaction::Pointer(state));
            self.pointer_down_shift_key(cell);
            return;
        }

        state.node = Some(cell);
        tracing::trace!(target: TARGET, ?cell, ctrl, "pointer down");
        self.interaction = Some(Interaction::Pointer(state));
    }

    pub fn pointer_down_shift_key(&mut self, cell: CellCoord) {
        let Some(anchor) = self.pointer_state().and_then(|p| p.node) else {
            return;
        };
        self.clear();
        self.select_range_from(cell, anchor);
    }

    /// The pointer entered `cell`. Only counts as a drag while the primary
    /// button is held; returns whether the selection changed.
    pub fn pointer_enter(&mut self, cell: CellCoord, primary_button_held: bool) -> bool {
        let Some(Interaction::Pointer(state)) = self.interaction.as_mut() else {
            if !primary_button_held {
                return false;
            }
            // Drag started outside the grid body: the first entered cell
            // anchors it and the drag adds to the current selection.
            self.commit_keyboard_range();
            let range = SelectionRange::single(cell);
            self.interaction = Some(Interaction::Pointer(PointerInteraction {
                node: Some(cell),
                ctrl: true,
                range: Some(range),
                dragging: true,
                ..PointerInteraction::default()
            }));
            self.temp.clear();
            fill_range(&mut self.temp, range);
            return true;
        };

        state.dragging = primary_button_held;
        if !primary_button_held {
            return false;
        }

        let anchor = *state.node.get_or_insert(cell);
        let range = SelectionRange::between(cell, anchor);
        state.range = Some(range);

        if state.ctrl {
            self.temp.clear();
            fill_range(&mut self.temp, range);
        } else {
            self.drag_select(cell, anchor);
        }
        tracing::trace!(target: TARGET, ?range, "pointer drag");
        true
    }

    /// Completes a pointer gesture. Returns the range to announce when the
    /// gesture was a drag or a shift-click.
    pub fn pointer_up(&mut self, cell: CellCoord) -> Option<SelectionRange> {
        let (dragging, shift, anchor) = match self.pointer_state() {
            Some(state) => (state.dragging, state.shift, state.node),
            None => (false, false, None),
        };

        if dragging {
            let range = self.generate_range(cell, anchor);
            self.ranges.insert(range);
            merge_map(&mut self.selection, &mut self.temp);
            if let Some(Interaction::Pointer(state)) = self.interaction.as_mut() {
                state.dragging = false;
            }
            tracing::debug!(target: TARGET, ?range, "drag selection committed");
            return Some(range);
        }

        if shift {
            let range = self.generate_range(cell, anchor);
            self.ranges.insert(range);
            return Some(range);
        }

        if self.pointer_in_body {
            self.add(cell);
        }
        None
    }

    /// All selected rectangles, including an in-progress keyboard range. Falls
    /// back to the active cell when nothing has been recorded.
    pub fn ranges(&self) -> Vec<SelectionRange> {
        let mut ranges = self.ranges.clone();
        if let Some(range) = self.keyboard_state().and_then(|k| k.range) {
            ranges.insert(range);
        }
        if ranges.is_empty() {
            if let Some(active) = self.active {
                ranges.insert(SelectionRange::single(active));
            }
        }
        ranges.into_iter().collect()
    }

    pub fn selected_cells(&self) -> Vec<CellCoord> {
        self.selection
            .iter()
            .flat_map(|(row, columns)| columns.iter().map(move |column| CellCoord::new(*row, *column)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty() && self.temp.is_empty() && self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.selection.clear();
        self.temp.clear();
        self.ranges.clear();
    }

    /// Clears selection together with the focused cell and any gesture state.
    pub fn reset(&mut self) {
        self.clear();
        self.active = None;
        self.interaction = None;
        self.pointer_in_body = false;
    }

    fn commit_keyboard_range(&mut self) {
        if let Some(range) = self.keyboard_state().and_then(|k| k.range) {
            self.ranges.insert(range);
        }
    }
}

fn insert_cell(map: &mut SelectionMap, cell: CellCoord) -> bool {
    map.entry(cell.row).or_default().insert(cell.column)
}

fn map_contains(map: &SelectionMap, cell: CellCoord) -> bool {
    map.get(&cell.row)
        .is_some_and(|columns| columns.contains(&cell.column))
}

fn fill_range(map: &mut SelectionMap, range: SelectionRange) {
    for row in range.row_start..=range.row_end {
        map.entry(row)
            .or_default()
            .extend(range.column_start..=range.column_end);
    }
}

fn merge_map(target: &mut SelectionMap, source: &mut SelectionMap) {
    for (row, columns) in std::mem::take(source) {
        target.entry(row).or_default().extend(columns);
    }
}
