use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;

use crate::io::atomic_write_string;
use crate::state::data_model::{Row, TableData};

const TARGET: &str = "gridcore::io";

#[derive(Debug, thiserror::Error)]
pub enum JsonIoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("JSON root is not an array")]
    NotAnArray,
    #[error("JSON array contains a non-object element at index {0}")]
    NotArrayOfObjects(usize),
}

/// Reads a dataset stored as a JSON array of objects.
pub fn load_json(path: &Path) -> Result<TableData, JsonIoError> {
    let content = fs::read_to_string(path)?;
    let rows = parse_rows(&content)?;
    tracing::debug!(target: TARGET, path = %path.display(), rows = rows.len(), "dataset loaded");
    Ok(rows)
}

pub fn parse_rows(content: &str) -> Result<TableData, JsonIoError> {
    let Value::Array(items) = serde_json::from_str::<Value>(content)? else {
        return Err(JsonIoError::NotAnArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => Ok(map.into_iter().collect::<Row>()),
            _ => Err(JsonIoError::NotArrayOfObjects(idx)),
        })
        .collect()
}

pub fn save_json(path: &Path, data: &[Row]) -> Result<(), JsonIoError> {
    let array: Vec<Value> = data
        .iter()
        .map(|row| {
            let map: serde_json::Map<String, Value> =
                row.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Value::Object(map)
        })
        .collect();

    let json = serde_json::to_string_pretty(&array)?;
    atomic_write_string(path, &json)?;
    tracing::debug!(target: TARGET, path = %path.display(), rows = data.len(), "dataset saved");
    Ok(())
}
