use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// A single scanned filesystem entry.
///
/// Produced by the [`DirectoryScanner`](crate::services::DirectoryScanner) and never mutated
/// afterwards. Directories carry `size == 0` and `is_binary == false`. Files above the size
/// threshold are never sniffed, so they also report `is_binary == false`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: Utf8PathBuf,
    pub is_directory: bool,
    pub size: u64,
    pub is_binary: bool,
}

impl FileEntry {
    /// Create a directory entry
    pub fn directory(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            size: 0,
            is_binary: false,
        }
    }

    /// Create a file entry
    pub fn file(path: impl Into<Utf8PathBuf>, size: u64, is_binary: bool) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            size,
            is_binary,
        }
    }

    /// Final path component, or the whole path for roots like `/`
    pub fn name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    /// Parent directory of this entry
    pub fn parent(&self) -> Option<&Utf8Path> {
        self.path.parent()
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory
    }
}
