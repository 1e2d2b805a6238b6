pub mod config;
pub mod import_log;
pub mod log;
pub mod plan;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Regular files of `dir`, sorted by name.
pub(crate) fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
