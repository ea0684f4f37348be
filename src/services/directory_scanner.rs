//! # Directory Scanning
//!
//! Lists the files in a materials directory that are eligible for screening.
//! The scan is non-recursive and matches the extension case-insensitively, so
//! `MOF-5.CIF` and `mof-5.cif` are both picked up. Results are sorted to keep
//! sub-task ordering stable across runs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to scan {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },
}

/// Enumerates eligible files in a directory
#[async_trait]
pub trait DirectoryScanner: Send + Sync + 'static {
    /// Whether `path` names an existing directory
    async fn exists(&self, path: &Path) -> bool;

    /// Eligible file paths directly inside `path`, sorted
    async fn list(&self, path: &Path, extension: &str) -> Result<Vec<PathBuf>, ScanError>;
}

/// Scanner over the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectoryScanner;

impl FsDirectoryScanner {
    pub fn new() -> Self {
        Self
    }

    fn has_extension(path: &Path, extension: &str) -> bool {
        let wanted = extension.trim_start_matches('.');
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
    }
}

#[async_trait]
impl DirectoryScanner for FsDirectoryScanner {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    }

    async fn list(&self, path: &Path, extension: &str) -> Result<Vec<PathBuf>, ScanError> {
        let io_error = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::NotFound(path.to_path_buf())
            } else {
                ScanError::Io {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        };

        let mut entries = tokio::fs::read_dir(path).await.map_err(io_error)?;
        let mut eligible = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let file_type = entry.file_type().await.map_err(io_error)?;
            let entry_path = entry.path();
            if file_type.is_file() && Self::has_extension(&entry_path, extension) {
                eligible.push(entry_path);
            }
        }

        eligible.sort();
        debug!(
            directory = %path.display(),
            extension = %extension,
            eligible = eligible.len(),
            "Directory scanned"
        );
        Ok(eligible)
    }
}
