use crate::models::{AppConfig, FileEntry, ScanProgress};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Deref;

/// An ordered entry list indexed by path.
///
/// Dereferences to the entry slice; the index is rebuilt whenever the list is replaced.
#[derive(Clone, Debug, Default)]
pub struct EntryList {
    entries: Vec<FileEntry>,
    index: HashMap<Utf8PathBuf, usize>,
}

impl EntryList {
    pub fn new(entries: Vec<FileEntry>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.clone(), i))
            .collect();
        Self { entries, index }
    }

    pub fn get(&self, path: &Utf8Path) -> Option<&FileEntry> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.index.contains_key(path)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl From<Vec<FileEntry>> for EntryList {
    fn from(entries: Vec<FileEntry>) -> Self {
        Self::new(entries)
    }
}

impl Deref for EntryList {
    type Target = [FileEntry];

    fn deref(&self) -> &[FileEntry] {
        &self.entries
    }
}

/// Scanned and filtered file lists for the current root.
///
/// Both lists are replaced wholesale on every scan or filter pass.
/// Invariant: every entry of `filtered_file_list` also appears in `full_file_list`.
#[derive(Clone, Debug, Default)]
pub struct DirectoryState {
    pub current_path: Option<Utf8PathBuf>,
    pub full_file_list: EntryList,
    pub filtered_file_list: EntryList,
    pub active_ignore_patterns: Vec<String>,
}

impl DirectoryState {
    /// Look up an entry in the full list
    pub fn entry(&self, path: &Utf8Path) -> Option<&FileEntry> {
        self.full_file_list.get(path)
    }

    /// Look up an entry in the visible list
    pub fn visible_entry(&self, path: &Utf8Path) -> Option<&FileEntry> {
        self.filtered_file_list.get(path)
    }

    /// Visible files (never directories) located strictly below `dir`
    pub fn visible_files_under<'a>(
        &'a self,
        dir: &'a Utf8Path,
    ) -> impl Iterator<Item = &'a FileEntry> + 'a {
        self.filtered_file_list
            .iter()
            .filter(move |e| e.is_file() && e.path.as_path() != dir && e.path.starts_with(dir))
    }

    /// Drop every list and pattern tied to the previous root
    pub fn clear_lists(&mut self) {
        self.full_file_list.clear();
        self.filtered_file_list.clear();
        self.active_ignore_patterns.clear();
    }
}

/// Selected file paths. Directories are never stored; they derive their state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionSet {
    paths: BTreeSet<Utf8PathBuf>,
}

impl SelectionSet {
    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.paths.contains(path)
    }

    pub fn insert(&mut self, path: Utf8PathBuf) -> bool {
        self.paths.insert(path)
    }

    pub fn remove(&mut self, path: &Utf8Path) -> bool {
        self.paths.remove(path)
    }

    /// Flip membership of a path. Returns true if the path is now selected.
    pub fn toggle(&mut self, path: &Utf8Path) -> bool {
        if self.paths.remove(path) {
            false
        } else {
            self.paths.insert(path.to_path_buf());
            true
        }
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.paths.iter()
    }

    /// Keep only paths that are files in `entries`.
    ///
    /// Returns the number of pruned paths.
    pub fn retain_files_in(&mut self, entries: &[FileEntry]) -> usize {
        let files: HashSet<&Utf8Path> = entries
            .iter()
            .filter(|e| e.is_file())
            .map(|e| e.path.as_path())
            .collect();
        let before = self.paths.len();
        self.paths.retain(|p| files.contains(p.as_path()));
        before - self.paths.len()
    }

    /// Remove every selected path rejected by `keep`. Returns the number removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&Utf8Path) -> bool) -> usize {
        let before = self.paths.len();
        self.paths.retain(|p| keep(p.as_path()));
        before - self.paths.len()
    }
}

impl Extend<Utf8PathBuf> for SelectionSet {
    fn extend<T: IntoIterator<Item = Utf8PathBuf>>(&mut self, iter: T) {
        self.paths.extend(iter);
    }
}

/// Expanded directory paths
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpansionSet {
    paths: HashSet<Utf8PathBuf>,
}

impl ExpansionSet {
    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.paths.contains(path)
    }

    pub fn insert(&mut self, path: Utf8PathBuf) -> bool {
        self.paths.insert(path)
    }

    pub fn remove(&mut self, path: &Utf8Path) -> bool {
        self.paths.remove(path)
    }

    pub fn toggle(&mut self, path: &Utf8Path) -> bool {
        if self.paths.remove(path) {
            false
        } else {
            self.paths.insert(path.to_path_buf());
            true
        }
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Keep only paths that are directories in `entries`
    pub fn retain_directories_in(&mut self, entries: &[FileEntry]) {
        let dirs: HashSet<&Utf8Path> = entries
            .iter()
            .filter(|e| e.is_directory)
            .map(|e| e.path.as_path())
            .collect();
        self.paths.retain(|p| dirs.contains(p.as_path()));
    }
}

impl Extend<Utf8PathBuf> for ExpansionSet {
    fn extend<T: IntoIterator<Item = Utf8PathBuf>>(&mut self, iter: T) {
        self.paths.extend(iter);
    }
}

/// User queries plus the last committed content-search result
#[derive(Clone, Debug, Default)]
pub struct QueryState {
    pub name_query: String,
    pub extension_query: String,
    pub content_query: String,
    pub content_matches: HashSet<Utf8PathBuf>,
    pub is_searching: bool,
}

impl QueryState {
    pub fn has_name_query(&self) -> bool {
        !self.name_query.is_empty()
    }

    pub fn has_content_query(&self) -> bool {
        !self.content_query.is_empty()
    }
}

/// Lifecycle of the scan task.
///
/// `Idle → Scanning → {Completed | Cancelled | Error} → Idle`. Entering `Scanning` is allowed
/// from any phase; re-entering it supersedes the previous scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanPhase {
    #[default]
    Idle,
    Scanning,
    Completed,
    Cancelled,
    Error,
}

impl ScanPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanPhase::Completed | ScanPhase::Cancelled | ScanPhase::Error
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct TaskState {
    pub phase: ScanPhase,
    pub progress: ScanProgress,
}

impl TaskState {
    pub fn is_scanning(&self) -> bool {
        self.phase == ScanPhase::Scanning
    }

    /// Enter `Scanning`, resetting progress counters
    pub fn begin_scan(&mut self) {
        self.phase = ScanPhase::Scanning;
        self.progress = ScanProgress::default();
    }

    /// Move from `Scanning` to a terminal phase.
    ///
    /// Returns false (and leaves the phase untouched) when no scan is active or the target is
    /// not terminal.
    pub fn finish(&mut self, outcome: ScanPhase) -> bool {
        if self.phase != ScanPhase::Scanning || !outcome.is_terminal() {
            tracing::debug!("Ignoring scan transition {:?} -> {:?}", self.phase, outcome);
            return false;
        }
        self.phase = outcome;
        true
    }

    /// Return to `Idle` after a terminal phase has been reported
    pub fn settle(&mut self) {
        if self.phase.is_terminal() {
            self.phase = ScanPhase::Idle;
        }
    }
}

/// Single source of truth for all coordinator-owned state.
///
/// Only the [`StateCoordinator`](crate::state::StateCoordinator) actor holds an `AppState`;
/// background workers return results and never touch it.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub config: AppConfig,
    pub directory: DirectoryState,
    pub selection: SelectionSet,
    pub expansion: ExpansionSet,
    pub query: QueryState,
    pub task: TaskState,
    pub previewed_path: Option<Utf8PathBuf>,
    pub status_message: String,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Total size in bytes of the selected files
    pub fn selected_size(&self) -> u64 {
        self.directory
            .full_file_list
            .iter()
            .filter(|e| e.is_file() && self.selection.contains(&e.path))
            .map(|e| e.size)
            .sum()
    }

    /// Clear selection, expansion, content matches and preview tied to the previous root
    pub fn reset_for_new_root(&mut self) {
        self.directory.clear_lists();
        self.selection.clear();
        self.expansion.clear();
        self.query.content_matches.clear();
        self.previewed_path = None;
    }

    /// Drop selection and expansion entries that no longer exist in the full list
    pub fn prune_stale_paths(&mut self) -> usize {
        let pruned = self
            .selection
            .retain_files_in(&self.directory.full_file_list);
        self.expansion
            .retain_directories_in(&self.directory.full_file_list);
        if self
            .previewed_path
            .as_deref()
            .is_some_and(|p| self.directory.entry(p).is_none())
        {
            self.previewed_path = None;
        }
        pruned
    }
}
