use std::fs;
use std::io;
use std::path::Path;

use crate::state::columns::{ConfigError, GridConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigIoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

/// Reads a JSON grid config and validates it.
pub fn load_config(path: &Path) -> Result<GridConfig, ConfigIoError> {
    let content = fs::read_to_string(path)?;
    let config: GridConfig = serde_json::from_str(&content)?;
    if let Err(err) = config.validate() {
        tracing::warn!(target: "gridcore::io", path = %path.display(), %err, "rejected grid config");
        return Err(err.into());
    }
    Ok(config)
}
