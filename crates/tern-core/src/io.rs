//! File I/O helpers with path-carrying errors and atomic writes.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

use crate::error::{Error, Result};
use crate::ui::Ui;

/// Read a file into a string, attaching the path to any error.
pub(crate) fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Write content atomically: write to a sibling temp file, flush, then
/// rename over the target. An advisory lock on the temp file keeps two
/// processes from interleaving writes to the same target.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
    }

    // Same directory, so the rename stays on one filesystem.
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file
        .sync_all()
        .map_err(|e| Error::io(&temp_path, e))?;
    let _ = temp_file.unlock();

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))
}

/// Warn (once per key) about top-level mapping keys that no schema field
/// matches. Unknown keys are tolerated so older tools can read files
/// written by newer ones.
pub(crate) fn warn_unknown_keys(
    value: &serde_yaml::Value,
    known: &[&str],
    context: &str,
    ui: &dyn Ui,
) {
    let serde_yaml::Value::Mapping(mapping) = value else {
        return;
    };
    for key in mapping.keys() {
        if let serde_yaml::Value::String(key) = key {
            if !known.contains(&key.as_str()) {
                ui.report_warning(&format!("Unknown key '{key}' in {context}"));
            }
        }
    }
}
