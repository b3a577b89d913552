//! Source file scanner
//!
//! Walks the source directory once at run start and produces an immutable
//! snapshot of the files to process. Hidden files and hidden directories
//! (name starting with '.') are skipped. Entries are sorted by file name so
//! a run processes the same collection in the same order every time.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One file in the run snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Full path of the source file
    pub path: PathBuf,
    /// File name including extension
    pub file_name: String,
    /// Base name without the final extension
    pub stem: String,
    /// Extension without the dot, lowercased; empty when absent
    pub extension: String,
}

impl SourceFile {
    fn from_path(path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        Some(Self {
            path,
            file_name,
            stem,
            extension,
        })
    }

    /// Whether the extension is in the known image/RAW set
    pub fn is_image(&self) -> bool {
        is_image_extension(&self.extension)
    }
}

/// Known image and camera RAW extensions, lowercased
pub fn is_image_extension(ext: &str) -> bool {
    matches!(
        ext,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" | "heic" | "heif"
            | "cr2" | "cr3" | "nef" | "arw" | "dng" | "orf" | "rw2" | "raf"
    )
}

/// Snapshot scanner for the source directory
pub struct FileScanner;

impl FileScanner {
    pub fn new() -> Self {
        Self
    }

    /// Walk the source tree and return the snapshot
    ///
    /// Unreadable entries are logged and skipped; only a bad root aborts
    /// the scan. Files whose names are not valid UTF-8 are skipped with a
    /// warning.
    pub fn scan(&self, root_path: &Path) -> Result<Vec<SourceFile>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e.file_name().to_string_lossy().as_ref()) || e.depth() == 0);

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    match SourceFile::from_path(entry.path().to_path_buf()) {
                        Some(file) => files.push(file),
                        None => {
                            tracing::warn!(
                                path = %entry.path().display(),
                                "Skipping file with non-UTF-8 name"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    // Continue scanning, don't abort
                }
            }
        }

        tracing::debug!(files = files.len(), root = %root_path.display(), "Scan complete");
        Ok(files)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
