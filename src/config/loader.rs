// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a config file without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let raw: RawConfigFile = toml::from_str(&text)?;

    debug!(path = %path.display(), tasks = raw.task.len(), "config parsed");
    Ok(raw)
}

/// Read a config file and validate it into a [`ConfigFile`].
///
/// On top of parsing, this rejects unknown or self `after` entries, pointwise
/// links between tasks of different sizes, task cycles and a zero worker
/// count.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}
