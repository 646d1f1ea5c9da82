use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::io::atomic_write_string;
use crate::io::json_io::{self, JsonIoError};
use crate::state::columns::{ConfigError, GridConfig};
use crate::state::grid_state::{GridState, GridStateSnapshot};

const TARGET: &str = "gridcore::io";

#[derive(Debug, thiserror::Error)]
pub enum GridStateIoError {
    #[error(transparent)]
    Json(#[from] JsonIoError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("grid state parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("grid state belongs to grid '{found}', expected '{expected}'")]
    GridMismatch { expected: String, found: String },
}

/// Sidecar path that stores view state next to a dataset file.
pub fn state_path_for_json(json_path: &Path) -> PathBuf {
    let mut os: OsString = json_path.as_os_str().to_os_string();
    os.push(".gridstate");
    PathBuf::from(os)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct GridStateFile {
    grid_id: String,
    #[serde(flatten)]
    state: GridStateSnapshot,
}

pub fn save_state(json_path: &Path, grid: &GridState) -> Result<(), GridStateIoError> {
    let path = state_path_for_json(json_path);
    let file = GridStateFile {
        grid_id: grid.config().id.clone(),
        state: grid.snapshot_state(),
    };
    let content = serde_json::to_string_pretty(&file)?;
    atomic_write_string(&path, &content)?;
    tracing::debug!(target: TARGET, path = %path.display(), "grid state saved");
    Ok(())
}

/// Restores the sidecar into `grid`. A missing sidecar leaves the grid
/// untouched and returns `false`.
pub fn load_state(json_path: &Path, grid: &mut GridState) -> Result<bool, GridStateIoError> {
    let path = state_path_for_json(json_path);
    if !path.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(&path)?;
    let file: GridStateFile = serde_json::from_str(&content)?;
    if file.grid_id != grid.config().id {
        return Err(GridStateIoError::GridMismatch {
            expected: grid.config().id.clone(),
            found: file.grid_id,
        });
    }

    grid.restore_state(file.state);
    tracing::debug!(target: TARGET, path = %path.display(), "grid state restored");
    Ok(true)
}

/// Loads a dataset and, when present, its saved view state.
pub fn load_json_and_state(
    json_path: &Path,
    config: GridConfig,
) -> Result<GridState, GridStateIoError> {
    let data = json_io::load_json(json_path)?;
    let mut grid = GridState::from_data(config, data)?;
    load_state(json_path, &mut grid)?;
    Ok(grid)
}
