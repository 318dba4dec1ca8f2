//! Project root validation and output directory setup

use crate::error::{DemoError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Confirm `root` is a project root by looking for `marker`
///
/// Performs no writes.
pub fn verify_root(root: &Path, marker: &str) -> Result<()> {
    if !root.is_dir() {
        return Err(DemoError::preflight(format!(
            "Root directory '{}' does not exist",
            root.display()
        )));
    }
    if !root.join(marker).is_file() {
        return Err(DemoError::preflight(format!(
            "'{}' not found in '{}'",
            marker,
            root.display()
        )));
    }
    Ok(())
}

/// Create the output directories under `root`; existing ones are left alone
pub fn prepare_output_dirs(root: &Path, dirs: &[PathBuf]) -> Result<()> {
    for dir in dirs {
        let path = root.join(dir);
        fs::create_dir_all(&path)
            .map_err(|e| DemoError::file_io_error("create directory", &path, &e))?;
        tracing::debug!(path = %path.display(), "Output directory ready");
    }
    Ok(())
}
