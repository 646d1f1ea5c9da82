use std::collections::BTreeMap;

use serde_json::Value;

use crate::state::data_model::{Row, RowId};

/// Field updates buffered while a row edit is open. Changes are only applied
/// to the dataset when the pending block is closed with `commit = true`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionLog {
    pending: Option<BTreeMap<RowId, Row>>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_pending(&mut self) {
        self.pending.get_or_insert_with(BTreeMap::new);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Buffers `field = value` for `id`. Returns `false` when no pending block
    /// is open.
    pub fn add(&mut self, id: RowId, field: &str, value: Value) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        pending.entry(id).or_default().insert(field.to_string(), value);
        true
    }

    pub fn changes(&self, id: &RowId) -> Option<&Row> {
        self.pending.as_ref()?.get(id)
    }

    /// `base` with the buffered changes for `id` applied, or `None` when the
    /// row has no buffered changes.
    pub fn aggregated_value(&self, id: &RowId, base: &Row) -> Option<Row> {
        let changes = self.changes(id)?;
        let mut merged = base.clone();
        merged.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        Some(merged)
    }

    /// Closes the pending block. Committed changes are handed back for the
    /// owner to apply; discarded ones are dropped.
    pub fn end_pending(&mut self, commit: bool) -> BTreeMap<RowId, Row> {
        let changes = self.pending.take().unwrap_or_default();
        if commit {
            changes
        } else {
            BTreeMap::new()
        }
    }
}
