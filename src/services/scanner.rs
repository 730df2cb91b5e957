use crate::models::{AppConfig, FileEntry, ScanProgress};
use crate::services::cancel::{Cancelled, CancellationToken};
use crate::services::ignore_rules::{self, GitignoreStack, IgnoreRules, IgnoreVerdict};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use std::fs::{self, File};
use std::io::Read;
use thiserror::Error;

/// Number of leading bytes inspected by the binary heuristic
pub const BINARY_SNIFF_BYTES: u64 = 8192;

/// Everything a scan needs, captured when the scan is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub root: Utf8PathBuf,
    pub ignore_patterns: Vec<String>,
    pub use_gitignore: bool,
    pub max_file_size: u64,
    pub progress_interval: usize,
}

impl ScanRequest {
    pub fn from_config(root: impl Into<Utf8PathBuf>, config: &AppConfig) -> Self {
        Self {
            root: root.into(),
            ignore_patterns: config.ignore_patterns.clone(),
            use_gitignore: config.use_gitignore,
            max_file_size: config.max_file_size,
            progress_interval: config.progress_interval.max(1),
        }
    }
}

/// Aggregate counters for one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub large_files_skipped: usize,
    /// Entries skipped because of permission errors, broken symlinks, non-UTF-8 names, ...
    pub io_errors: usize,
}

/// Result of a completed scan
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// All entries under the root after ignore exclusion, sorted by path
    pub entries: Vec<FileEntry>,
    /// Patterns that excluded at least one entry, in first-hit order
    pub active_ignore_patterns: Vec<String>,
    pub stats: ScanStats,
}

/// Fatal scan outcomes. Per-entry I/O problems are counted in [`ScanStats`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Invalid root {path}: {reason}")]
    InvalidRoot { path: String, reason: String },

    #[error("Scan cancelled")]
    Cancelled,
}

impl From<Cancelled> for ScanError {
    fn from(_: Cancelled) -> Self {
        ScanError::Cancelled
    }
}

impl ScanError {
    fn invalid_root(path: &Utf8Path, reason: impl Into<String>) -> Self {
        ScanError::InvalidRoot {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Resolve `root` to an absolute, existing, UTF-8 directory path
pub fn validate_root(root: &Utf8Path) -> Result<Utf8PathBuf, ScanError> {
    let canonical = fs::canonicalize(root.as_std_path())
        .map_err(|e| ScanError::invalid_root(root, e.to_string()))?;

    let metadata = fs::metadata(&canonical)
        .map_err(|e| ScanError::invalid_root(root, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(ScanError::invalid_root(root, "not a directory"));
    }

    Utf8PathBuf::from_path_buf(canonical)
        .map_err(|p| ScanError::invalid_root(root, format!("non UTF-8 path {}", p.display())))
}

/// Directory traversal used by the state coordinator.
///
/// Implementations run on a blocking thread, must poll `cancel` periodically, and must call
/// `on_progress` at a bounded rate.
pub trait DirectoryScanner: Send + Sync {
    /// Check a requested root before any state is touched
    fn validate_root(&self, root: &Utf8Path) -> Result<Utf8PathBuf, ScanError> {
        validate_root(root)
    }

    fn scan(
        &self,
        request: &ScanRequest,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(ScanProgress),
    ) -> Result<ScanOutcome, ScanError>;
}

/// Scanner backed by `std::fs` with gitignore-style exclusion
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemScanner;

impl FileSystemScanner {
    pub fn new() -> Self {
        Self
    }
}

impl DirectoryScanner for FileSystemScanner {
    fn scan(
        &self,
        request: &ScanRequest,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(ScanProgress),
    ) -> Result<ScanOutcome, ScanError> {
        let root = &request.root;
        if !root.is_dir() {
            return Err(ScanError::invalid_root(root, "not a directory"));
        }

        tracing::info!(
            "Scanning {} (patterns={}, gitignore={}, max_file_size={})",
            root,
            request.ignore_patterns.len(),
            request.use_gitignore,
            request.max_file_size
        );

        let rules = IgnoreRules::compile(root, &request.ignore_patterns);
        let mut walk = Walk {
            request,
            rules: &rules,
            cancel,
            entries: Vec::new(),
            active: IndexSet::new(),
            stats: ScanStats::default(),
        };

        let mut pending: Vec<(Utf8PathBuf, GitignoreStack)> =
            vec![(root.clone(), GitignoreStack::default())];

        while let Some((dir, inherited)) = pending.pop() {
            cancel.check()?;

            let gitignores = if request.use_gitignore {
                inherited.descend(&dir)
            } else {
                inherited
            };

            walk.read_directory(&dir, &gitignores, &mut pending, on_progress)?;
        }

        let Walk {
            mut entries,
            active,
            stats,
            ..
        } = walk;

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        on_progress(ScanProgress {
            files_scanned: stats.files_scanned,
            large_files_skipped: stats.large_files_skipped,
            current_scanning_path: None,
        });

        tracing::info!(
            "Scan of {} finished: {} entries, {} large files, {} I/O errors, {} active ignore patterns",
            root,
            entries.len(),
            stats.large_files_skipped,
            stats.io_errors,
            active.len()
        );

        Ok(ScanOutcome {
            entries,
            active_ignore_patterns: active.into_iter().collect(),
            stats,
        })
    }
}

struct Walk<'a> {
    request: &'a ScanRequest,
    rules: &'a IgnoreRules,
    cancel: &'a CancellationToken,
    entries: Vec<FileEntry>,
    active: IndexSet<String>,
    stats: ScanStats,
}

impl Walk<'_> {
    fn read_directory(
        &mut self,
        dir: &Utf8Path,
        gitignores: &GitignoreStack,
        pending: &mut Vec<(Utf8PathBuf, GitignoreStack)>,
        on_progress: &mut dyn FnMut(ScanProgress),
    ) -> Result<(), ScanError> {
        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                tracing::warn!("Skipping unreadable directory {}: {}", dir, e);
                self.stats.io_errors += 1;
                return Ok(());
            }
        };

        for dirent in read_dir {
            let dirent = match dirent {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Skipping entry in {}: {}", dir, e);
                    self.stats.io_errors += 1;
                    continue;
                }
            };

            let path = match Utf8PathBuf::from_path_buf(dirent.path()) {
                Ok(p) => p,
                Err(p) => {
                    tracing::warn!("Skipping non UTF-8 path {}", p.display());
                    self.stats.io_errors += 1;
                    continue;
                }
            };

            let file_type = match dirent.file_type() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path, e);
                    self.stats.io_errors += 1;
                    continue;
                }
            };

            // Symlinks are resolved for metadata only; linked directories are not descended.
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path, e);
                    self.stats.io_errors += 1;
                    continue;
                }
            };
            let is_dir = metadata.is_dir();

            if let IgnoreVerdict::Ignored(pattern) =
                ignore_rules::resolve(self.rules, gitignores, &path, is_dir)
            {
                tracing::trace!("Ignoring {} (matched '{}')", path, pattern);
                self.active.insert(pattern);
                continue;
            }

            if is_dir {
                if !file_type.is_symlink() {
                    pending.push((path.clone(), gitignores.clone()));
                }
                self.entries.push(FileEntry::directory(path));
            } else {
                let size = metadata.len();
                let is_binary = if size > self.request.max_file_size {
                    self.stats.large_files_skipped += 1;
                    false
                } else {
                    match sniff_binary(&path) {
                        Ok(binary) => binary,
                        Err(e) => {
                            tracing::debug!("Could not sniff {}: {}", path, e);
                            self.stats.io_errors += 1;
                            false
                        }
                    }
                };
                self.entries.push(FileEntry::file(path, size, is_binary));
            }

            self.stats.files_scanned += 1;
            let interval = self.request.progress_interval.max(1);
            if self.stats.files_scanned % interval == 0 {
                self.cancel.check()?;
                on_progress(ScanProgress {
                    files_scanned: self.stats.files_scanned,
                    large_files_skipped: self.stats.large_files_skipped,
                    current_scanning_path: Some(dir.to_path_buf()),
                });
            }
        }

        Ok(())
    }
}

/// A file is binary if a NUL byte appears within its first [`BINARY_SNIFF_BYTES`]
pub fn sniff_binary(path: &Utf8Path) -> std::io::Result<bool> {
    let mut head = Vec::with_capacity(BINARY_SNIFF_BYTES as usize);
    File::open(path)?
        .take(BINARY_SNIFF_BYTES)
        .read_to_end(&mut head)?;
    Ok(has_binary_head(&head))
}

/// Apply the NUL-byte heuristic to already loaded file contents
pub fn has_binary_head(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES as usize)];
    memchr::memchr(0, head).is_some()
}
