//! Edit-session bookkeeping: at most one cell and one row are in edit mode.
//!
//! [`CrudService`] only tracks sessions and drives the transitions between
//! them. Writing values back and closing transactions belongs to the
//! [`EditHost`] passed into each call.

use serde_json::Value;

use crate::state::columns::{ColumnDef, DataType};
use crate::state::data_model::{self, Row, RowId};

const TARGET: &str = "gridcore::crud";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellId {
    pub row_id: RowId,
    pub column_id: usize,
    pub row_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CellEditSession {
    pub id: CellId,
    pub row_index: usize,
    pub column: ColumnDef,
    pub original_value: Value,
    pub edit_value: Value,
    pub row_data: Row,
}

impl CellEditSession {
    pub fn new(id: CellId, column: ColumnDef, row_data: Row) -> Self {
        let original_value = data_model::field_value(&row_data, &column.field).clone();
        Self {
            row_index: id.row_index,
            id,
            column,
            edit_value: original_value.clone(),
            original_value,
            row_data,
        }
    }

    /// The value that would be written on commit. Numeric columns without a
    /// custom editor never store NaN: unparsable input becomes `0`.
    pub fn cast_value(&self) -> Value {
        if self.column.data_type == DataType::Number && !self.column.has_editor_template {
            coerce_numeric(&self.edit_value)
        } else {
            self.edit_value.clone()
        }
    }

    pub fn enter_args(&self) -> CellEditEnterArgs {
        CellEditEnterArgs {
            row_id: self.id.row_id.clone(),
            cell_id: self.id.clone(),
            old_value: self.original_value.clone(),
            cancel: false,
        }
    }

    pub fn done_args(&self) -> CellEditDoneArgs {
        CellEditDoneArgs {
            row_id: self.id.row_id.clone(),
            cell_id: self.id.clone(),
            old_value: self.original_value.clone(),
            new_value: self.cast_value(),
        }
    }
}

/// Reads `value` the way a numeric editor does: leading-number parse, with
/// anything non-finite or unparsable coerced to `0`.
pub fn coerce_numeric(value: &Value) -> Value {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => data_model::parse_float_prefix(s),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .and_then(data_model::json_number_from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::Number(0.into()))
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowEditSession {
    pub id: RowId,
    pub index: usize,
    pub data: Row,
    /// Aggregated pending state of the row when the session opened.
    pub transaction_state: Option<Row>,
    pub new_data: Option<Row>,
}

impl RowEditSession {
    pub fn from_cell(cell: &CellEditSession) -> Self {
        Self {
            id: cell.id.row_id.clone(),
            index: cell.row_index,
            data: cell.row_data.clone(),
            transaction_state: None,
            new_data: None,
        }
    }

    pub fn enter_args(&self) -> RowEditEnterArgs {
        RowEditEnterArgs {
            row_id: self.id.clone(),
            old_value: self.data.clone(),
            new_value: self.new_data.clone(),
            cancel: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CellEditEnterArgs {
    pub row_id: RowId,
    pub cell_id: CellId,
    pub old_value: Value,
    pub cancel: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowEditEnterArgs {
    pub row_id: RowId,
    pub old_value: Row,
    pub new_value: Option<Row>,
    pub cancel: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CellEditDoneArgs {
    pub row_id: RowId,
    pub cell_id: CellId,
    pub old_value: Value,
    pub new_value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowEditDoneArgs {
    pub row_id: RowId,
    pub old_value: Row,
    pub new_value: Row,
    pub committed: bool,
}

/// Observer for edit notifications. The `*_enter` calls are cancelable by
/// setting `args.cancel`.
pub trait EditListener {
    fn cell_edit_enter(&mut self, _args: &mut CellEditEnterArgs) {}
    fn row_edit_enter(&mut self, _args: &mut RowEditEnterArgs) {}
    fn cell_edit_done(&mut self, _args: &CellEditDoneArgs) {}
    fn row_edit_done(&mut self, _args: &RowEditDoneArgs) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl EditListener for NoopListener {}

/// What the service needs from its owner while changing sessions.
pub trait EditHost {
    fn cell_edit_enter(&mut self, args: &mut CellEditEnterArgs);
    fn row_edit_enter(&mut self, args: &mut RowEditEnterArgs);
    /// Pending (uncommitted) state of the row, snapshotted into new sessions.
    fn row_transaction_state(&self, row: &RowEditSession) -> Option<Row>;
    fn start_row_transaction(&mut self);
    /// Closes a row session that the service ended on its own, either because
    /// another row took over (`commit = true`) or because entry was canceled.
    fn end_row_transaction(&mut self, row: RowEditSession, commit: bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditState {
    Idle,
    CellEditing,
    RowEditing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The cell-enter notification was canceled; nothing is in edit.
    Cancelled,
    /// The requested cell is already the one being edited.
    AlreadyEditing,
    /// A cell session is open (within the existing row session, if any).
    CellStarted,
    /// A cell session and a fresh row session are open.
    RowStarted,
    /// The cell session is open but the row-enter notification was canceled.
    RowCancelled,
}

#[derive(Clone, Debug, Default)]
pub struct CrudService {
    cell: Option<CellEditSession>,
    row: Option<RowEditSession>,
    row_editable: bool,
}

impl CrudService {
    pub fn new(row_editable: bool) -> Self {
        Self {
            row_editable,
            ..Self::default()
        }
    }

    pub fn row_editable(&self) -> bool {
        self.row_editable
    }

    pub fn set_row_editable(&mut self, row_editable: bool) {
        self.row_editable = row_editable;
    }

    pub fn cell(&self) -> Option<&CellEditSession> {
        self.cell.as_ref()
    }

    pub fn cell_mut(&mut self) -> Option<&mut CellEditSession> {
        self.cell.as_mut()
    }

    pub fn row(&self) -> Option<&RowEditSession> {
        self.row.as_ref()
    }

    pub fn in_edit_mode(&self) -> bool {
        self.cell.is_some()
    }

    pub fn state(&self) -> EditState {
        if self.row.is_some() {
            EditState::RowEditing
        } else if self.cell.is_some() {
            EditState::CellEditing
        } else {
            EditState::Idle
        }
    }

    pub fn same_row(&self, id: &RowId) -> bool {
        self.row.as_ref().is_some_and(|row| &row.id == id)
    }

    pub fn same_cell(&self, cell: &CellId) -> bool {
        self.cell.as_ref().is_some_and(|current| {
            current.id.row_id == cell.row_id && current.id.column_id == cell.column_id
        })
    }

    pub fn begin(&mut self, cell: CellEditSession, host: &mut dyn EditHost) -> BeginOutcome {
        if self.same_cell(&cell.id) {
            return BeginOutcome::AlreadyEditing;
        }

        let mut args = cell.enter_args();
        host.cell_edit_enter(&mut args);
        if args.cancel {
            tracing::debug!(target: TARGET, row = %cell.id.row_id, column = cell.id.column_id, "cell edit canceled");
            self.end();
            return BeginOutcome::Cancelled;
        }

        tracing::debug!(target: TARGET, row = %cell.id.row_id, column = cell.id.column_id, "cell edit started");
        if !self.row_editable {
            self.cell = Some(cell);
            self.end_row_edit();
            return BeginOutcome::CellStarted;
        }

        let row_id = cell.id.row_id.clone();
        if self.row.is_some() && !self.same_row(&row_id) {
            if let Some(previous) = self.row.take() {
                tracing::debug!(target: TARGET, row = %previous.id, "row edit force-committed");
                host.end_row_transaction(previous, true);
            }
        }

        let same_row = self.same_row(&row_id);
        self.cell = Some(cell);
        if same_row {
            BeginOutcome::CellStarted
        } else {
            self.begin_row_edit(host)
        }
    }

    /// Opens a row session around the cell currently in edit.
    pub fn begin_row_edit(&mut self, host: &mut dyn EditHost) -> BeginOutcome {
        let Some(cell) = self.cell.as_ref() else {
            return BeginOutcome::Cancelled;
        };

        let mut row = RowEditSession::from_cell(cell);
        row.transaction_state = host.row_transaction_state(&row);
        host.start_row_transaction();

        let mut args = row.enter_args();
        let row_id = row.id.clone();
        self.row = Some(row);
        host.row_edit_enter(&mut args);

        if args.cancel {
            if let Some(row) = self.row.take() {
                host.end_row_transaction(row, false);
            }
            tracing::debug!(target: TARGET, row = %row_id, "row edit canceled");
            return BeginOutcome::RowCancelled;
        }

        tracing::debug!(target: TARGET, row = %row_id, "row edit started");
        BeginOutcome::RowStarted
    }

    /// Discards the cell session.
    pub fn end(&mut self) -> Option<CellEditSession> {
        self.cell.take()
    }

    /// Discards the row session unconditionally; committing is up to the caller.
    pub fn end_row_edit(&mut self) -> Option<RowEditSession> {
        self.row.take()
    }
}
