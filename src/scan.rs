//! Input discovery.
//!
//! Expands the paths given on the command line into the list of image files
//! to process:
//!
//! - **Files** are taken as given, whatever their extension. The pipeline
//!   sniffs the container from the bytes and passes unknown data through.
//! - **Directories** are walked recursively. Only files with a known image
//!   extension are kept; hidden files and directories are skipped.
//!
//! Each file remembers its path below the directory it was found in, so the
//! batch can mirror the input tree under the output directory. The result is
//! sorted and deduplicated so batch output is deterministic.

use crate::imaging::ImageKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
}

/// A file to process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputFile {
    pub path: PathBuf,
    /// Path below the scanned directory; just the file name for files given
    /// directly.
    pub relative: PathBuf,
}

impl InputFile {
    /// A file given directly, outside any scanned directory.
    pub fn standalone(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let relative = path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.clone());
        Self { path, relative }
    }
}

/// Expand files and directories into a sorted list of image files.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<InputFile>, ScanError> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(InputFile::standalone(path));
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            {
                let entry = entry?;
                if entry.file_type().is_file() && is_image(entry.path()) {
                    let relative = entry
                        .path()
                        .strip_prefix(path)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
                    files.push(InputFile {
                        path: entry.into_path(),
                        relative,
                    });
                }
            }
        } else {
            return Err(ScanError::NotFound(path.clone()));
        }
    }

    // A file reached twice keeps its shortest relative path
    files.sort();
    files.dedup_by(|later, earlier| later.path == earlier.path);
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Whether a path has an extension naming a known image format.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse::<ImageKind>().ok())
        .is_some()
}
