use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::pipeline::paging::PagingState;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub field: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub editable: bool,
    /// A custom editor owns value conversion, so numeric coercion is skipped.
    #[serde(default)]
    pub has_editor_template: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default = "default_true")]
    pub groupable: bool,
}

impl ColumnDef {
    pub fn new(field: impl Into<String>, data_type: DataType) -> Self {
        Self {
            field: field.into(),
            data_type,
            editable: true,
            has_editor_template: false,
            sortable: true,
            filterable: true,
            groupable: true,
        }
    }

    pub fn with_editor_template(mut self) -> Self {
        self.has_editor_template = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Supplied by the owner; there is no process-wide instance counter.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub row_editable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<PagingState>,
    #[serde(default = "default_true")]
    pub groups_expanded: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("grid id must not be empty")]
    EmptyId,
    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),
    #[error("primary key '{0}' is not a declared column")]
    UnknownPrimaryKey(String),
    #[error("records per page must be greater than zero")]
    ZeroPageSize,
}

impl GridConfig {
    pub fn new(id: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            id: id.into(),
            primary_key: None,
            columns,
            row_editable: false,
            paging: None,
            groups_expanded: true,
        }
    }

    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    pub fn with_row_editing(mut self) -> Self {
        self.row_editable = true;
        self
    }

    pub fn with_paging(mut self, records_per_page: usize) -> Self {
        self.paging = Some(PagingState::new(0, records_per_page));
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(column.field.as_str()) {
                return Err(ConfigError::DuplicateColumn(column.field.clone()));
            }
        }

        if let Some(key) = self.primary_key.as_deref() {
            if !seen.contains(key) {
                return Err(ConfigError::UnknownPrimaryKey(key.to_string()));
            }
        }

        if matches!(self.paging, Some(p) if p.records_per_page == 0) {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(())
    }

    pub fn column(&self, field: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn column_at(&self, index: usize) -> Option<&ColumnDef> {
        self.columns.get(index)
    }

    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    pub fn fields(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.field.clone()).collect()
    }
}

fn default_true() -> bool {
    true
}
