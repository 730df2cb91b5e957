//! UI-facing snapshot types.
//!
//! Everything here is rebuilt from scratch on each view regeneration and pushed outward as a
//! [`StateEvent`](crate::state::StateEvent). Nothing in this module is cached or mutated in
//! place by the coordinator.

use crate::models::AppConfig;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Aggregate selection status of a tree node.
///
/// Files are either `Full` or `None`; directories derive their state from descendant files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionState {
    #[default]
    None,
    Partial,
    Full,
}

impl SelectionState {
    /// Derive the state from descendant file counts
    pub fn from_counts(selected: usize, total: usize) -> Self {
        if total == 0 || selected == 0 {
            SelectionState::None
        } else if selected >= total {
            SelectionState::Full
        } else {
            SelectionState::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub path: Utf8PathBuf,
    pub is_directory: bool,
    pub is_binary: bool,
    pub size: u64,
    pub children: Vec<TreeNode>,
    pub selection_state: SelectionState,
    pub is_expanded: bool,
    pub is_match: bool,
    pub is_previewed: bool,
}

impl TreeNode {
    /// Depth-first search for a node by path
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        if self.path.as_str() == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }
}

/// Find a node anywhere in a projected forest
pub fn find_node<'a>(forest: &'a [TreeNode], path: &str) -> Option<&'a TreeNode> {
    forest.iter().find_map(|node| node.find(path))
}

/// Progress snapshot emitted while a scan is running
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub files_scanned: usize,
    pub large_files_skipped: usize,
    pub current_scanning_path: Option<Utf8PathBuf>,
}

/// Serializable snapshot of everything the UI renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    /// Increases by one with every pushed view model; snapshots repeat the latest value
    pub revision: u64,
    pub config: AppConfig,
    pub current_path: Option<Utf8PathBuf>,
    pub tree: Vec<TreeNode>,
    pub total_count: usize,
    pub visible_count: usize,
    pub selected_count: usize,
    pub selected_size: u64,
    pub is_scanning: bool,
    pub is_searching: bool,
    pub status_message: String,
    pub name_query: String,
    pub extension_query: String,
    pub content_query: String,
    pub active_ignore_patterns: Vec<String>,
    pub previewed_path: Option<Utf8PathBuf>,
}

impl ViewModel {
    /// True when neither a scan nor a content search is in flight
    pub fn is_settled(&self) -> bool {
        !self.is_scanning && !self.is_searching
    }

    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        find_node(&self.tree, path)
    }
}
