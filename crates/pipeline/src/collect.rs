//! Output collector: enumerate the artifacts one execution produced.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::PipelineError;

/// Directory entries that are archive-extraction junk, never artifacts.
/// Matching entries and everything beneath them are skipped.
const JUNK_ENTRIES: &[&str] = &["__MACOSX"];

/// Recursively enumerate the files under the output root.
///
/// Each discovered entry is logged with its path relative to the root
/// so the nesting is visible in the trace. The returned list is sorted
/// lexicographically by path: directory-enumeration order is platform
/// dependent, and callers get a stable order instead.
pub fn collect_artifacts(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).min_depth(1).into_iter();
    for entry in walker.filter_entry(|e| !is_junk(e.file_name())) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            PipelineError::io(path, source)
        })?;

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if entry.file_type().is_dir() {
            tracing::info!("{}/", relative.display());
        } else {
            tracing::info!("{}", relative.display());
            files.push(entry.into_path());
        }
    }

    files.sort();
    tracing::info!(count = files.len(), root = %root.display(), "Artifacts collected");
    Ok(files)
}

fn is_junk(name: &std::ffi::OsStr) -> bool {
    JUNK_ENTRIES
        .iter()
        .any(|junk| name == std::ffi::OsStr::new(junk))
}
