//! Pre-flight reset of the shared working directories.
//!
//! The input, output, and backend-temp directories are process-wide
//! mutable state with a reset-per-request lifecycle: each is wiped and
//! recreated empty before any new write, so nothing can leak from one
//! request into the next.

use std::path::Path;

use crate::error::PipelineError;

/// Wipe and recreate every given directory.
///
/// After this returns, each directory exists and contains zero
/// entries. Safe to call when a directory does not exist yet.
pub fn reset_dirs(dirs: &[&Path]) -> Result<(), PipelineError> {
    for dir in dirs {
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(|e| PipelineError::io(*dir, e))?;
        }
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(*dir, e))?;
        tracing::debug!(dir = %dir.display(), "Working directory reset");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn reset_empties_populated_directories() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("inputs");
        let output = root.path().join("outputs");
        std::fs::create_dir_all(output.join("nested")).unwrap();
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("stale.png"), b"old").unwrap();
        std::fs::write(output.join("nested").join("stale.webp"), b"old").unwrap();

        reset_dirs(&[&input, &output]).unwrap();

        assert_eq!(entry_count(&input), 0);
        assert_eq!(entry_count(&output), 0);
    }

    #[test]
    fn reset_creates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let fresh = root.path().join("never/existed");

        reset_dirs(&[&fresh]).unwrap();

        assert!(fresh.is_dir());
        assert_eq!(entry_count(&fresh), 0);
    }
}
