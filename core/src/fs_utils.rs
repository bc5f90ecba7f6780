//! # File Output
//!
//! Atomic writes (temp file + rename) that leave unchanged files untouched.

use crate::error::{AppError, AppResult};
use std::fs;
use std::io::Write;
use std::path::Path;

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New content was written.
    Written,
    /// The file already held identical content.
    Unchanged,
}

/// Whether writing `contents` would change the file at `path`.
pub fn would_change(path: &Path, contents: &str) -> bool {
    fs::read(path).map_or(true, |existing| existing != contents.as_bytes())
}

/// Writes `contents` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, contents: &str) -> AppResult<WriteOutcome> {
    if !would_change(path, contents) {
        return Ok(WriteOutcome::Unchanged);
    }

    let file_error = |e: std::io::Error| AppError::FileWrite {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    let parent = path.parent().ok_or_else(|| AppError::FileWrite {
        path: path.display().to_string(),
        reason: "path has no parent directory".into(),
    })?;
    fs::create_dir_all(parent).map_err(file_error)?;

    let tmp = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|s| s.to_str()).unwrap_or("out"),
        std::process::id()
    ));
    let written = write_temp(&tmp, contents).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(file_error(e));
    }
    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(WriteOutcome::Written)
}

fn write_temp(tmp: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// [`write_atomic`] with one retry on failure.
pub fn write_with_retry(path: &Path, contents: &str) -> AppResult<WriteOutcome> {
    match write_atomic(path, contents) {
        Ok(outcome) => Ok(outcome),
        Err(first) => {
            tracing::warn!(path = %path.display(), error = %first, "Write failed, retrying once");
            write_atomic(path, contents)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paths/v1/stop.yaml");
        assert_eq!(write_atomic(&path, "a: 1\n").unwrap(), WriteOutcome::Written);
        assert_eq!(write_atomic(&path, "a: 1\n").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(write_atomic(&path, "a: 2\n").unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 2\n");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory at the target makes the rename fail
        let target = dir.path().join("stop.yaml");
        fs::create_dir_all(target.join("occupied")).unwrap();
        assert!(write_atomic(&target, "a: 1\n").is_err());
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["stop.yaml".to_string()]);
    }

    #[test]
    fn test_failure_is_file_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let err = write_with_retry(&blocker.join("child.yaml"), "a").unwrap_err();
        assert_eq!(err.kind(), "FileWriteError");
    }
}
