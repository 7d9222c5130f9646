use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("document directory {} is not readable: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("document path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to walk document directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Lists candidate files below a document directory.
///
/// Returned names are relative to `root` and use `/` between components, so
/// `root.join(name)` always resolves back to the file.
pub trait Scanner {
    fn list_files(&self, root: &Path, recursive: bool) -> Result<Vec<String>, ScanError>;
}

/// Walks the real filesystem. Hidden entries are skipped, and a hidden
/// directory is not descended into.
pub struct FsScanner;

impl Scanner for FsScanner {
    fn list_files(&self, root: &Path, recursive: bool) -> Result<Vec<String>, ScanError> {
        let metadata = fs::metadata(root).map_err(|source| ScanError::Unreadable {
            path: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        // Entries skipped by min_depth never reach the predicate, so a hidden
        // root directory is still walked.
        for entry in walker.into_iter().filter_entry(|e| !is_hidden(e)) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            match relative_name(relative) {
                Some(name) => files.push(name),
                None => warn!("Skipping non UTF-8 path {:?}", entry.path()),
            }
        }

        debug!("Listed {} files under {:?}", files.len(), root);
        Ok(files)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|s| s.starts_with('.'))
}

fn relative_name(path: &Path) -> Option<String> {
    let parts = path
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Substring after the final `.` of the last path component, empty when the
/// name has no dot.
pub fn extension_of(filename: &str) -> &str {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    base.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

pub fn filter_accepted(files: Vec<String>, accepted: &BTreeSet<String>) -> Vec<String> {
    files
        .into_iter()
        .filter(|f| accepted.contains(extension_of(f)))
        .collect()
}
