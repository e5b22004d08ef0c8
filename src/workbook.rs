//! Finding, loading and saving the `.xlsx` workbooks in the sheets directory.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use umya_spreadsheet::Spreadsheet;

const EXTENSION: &str = "xlsx";
// Excel keeps `~$name.xlsx` owner files next to open workbooks.
const LOCK_FILE_PREFIX: &str = "~$";

/// Lists the workbooks directly inside `dir`, sorted by file name.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read sheets directory: {}", dir.display()))?;

    let mut books = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to list sheets directory: {}", dir.display()))?
            .path();
        let is_workbook = path.is_file()
            && path.extension().is_some_and(|ext| ext == EXTENSION)
            && !path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(LOCK_FILE_PREFIX));
        if is_workbook {
            books.push(path);
        }
    }

    books.sort();
    debug!(count = books.len(), "Discovered workbooks in {}", dir.display());
    Ok(books)
}

pub fn read(path: &Path) -> Result<Spreadsheet> {
    debug!("XLS.read: {}", path.display());
    umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| anyhow!("Failed to read workbook {}: {}", path.display(), e))
}

/// Writes `book` back to `path`. Returns `false` without touching the disk
/// when `dry_run` is set.
pub fn save(book: &Spreadsheet, path: &Path, dry_run: bool) -> Result<bool> {
    if dry_run {
        debug!("Dry run, not saving {}", path.display());
        return Ok(false);
    }

    debug!("XLS.save: {}", path.display());
    umya_spreadsheet::writer::xlsx::write(book, path)
        .map_err(|e| anyhow!("Failed to write workbook {}: {}", path.display(), e))?;
    Ok(true)
}
