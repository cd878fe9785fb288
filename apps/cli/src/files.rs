//! Strategy and article files on the user's disk.

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;

use keyplan_shared::KeywordGroup;

/// Read a strategy file: a JSON array of keyword groups, possibly empty.
pub(crate) fn read_strategy(path: &Path) -> Result<Vec<KeywordGroup>> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read strategy file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("'{}' is not a valid strategy file", path.display()))
}

/// Write `value` as pretty JSON, creating parent directories as needed.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_text(path, &json)
}

pub(crate) fn write_text(path: &Path, content: &str) -> Result<()> {
    write_bytes(path, content.as_bytes())
}

/// Write raw bytes, creating parent directories as needed.
pub(crate) fn write_bytes(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create '{}'", parent.display()))?;
    }
    std::fs::write(path, content)
        .wrap_err_with(|| format!("failed to write '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "wrote file");
    Ok(())
}
