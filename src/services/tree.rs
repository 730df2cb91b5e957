//! Pure projection of the visible file list into a UI tree.
//!
//! Nothing here is stored: the forest is rebuilt on every view regeneration, and directory
//! selection is always derived bottom-up from descendant files.

use crate::models::{ExpansionSet, FileEntry, SelectionSet, SelectionState, TreeNode};
use crate::services::filter::name_matches;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{HashMap, HashSet};

/// Everything the projector reads
#[derive(Debug, Clone, Copy)]
pub struct TreeInput<'a> {
    pub root: Option<&'a Utf8Path>,
    pub entries: &'a [FileEntry],
    pub selection: &'a SelectionSet,
    pub expansion: &'a ExpansionSet,
    pub content_matches: &'a HashSet<Utf8PathBuf>,
    pub name_query: &'a str,
    pub case_sensitive: bool,
    pub previewed: Option<&'a Utf8Path>,
}

/// Build the ordered forest under the root.
///
/// Entries whose parent is not itself a visible entry are attached at the top level, which
/// covers direct children of the root.
pub fn project_tree(input: &TreeInput<'_>) -> Vec<TreeNode> {
    let known: HashSet<&Utf8Path> = input.entries.iter().map(|e| e.path.as_path()).collect();

    let mut children: HashMap<&Utf8Path, Vec<&FileEntry>> = HashMap::new();
    let mut top_level: Vec<&FileEntry> = Vec::new();

    for entry in input.entries {
        if let Some(root) = input.root {
            if !entry.path.starts_with(root) || entry.path.as_path() == root {
                continue;
            }
        }
        match entry.parent() {
            Some(parent) if known.contains(parent) => {
                children.entry(parent).or_default().push(entry)
            }
            _ => top_level.push(entry),
        }
    }

    build_level(top_level, &children, input)
}

fn build_level(
    mut level: Vec<&FileEntry>,
    children: &HashMap<&Utf8Path, Vec<&FileEntry>>,
    input: &TreeInput<'_>,
) -> Vec<TreeNode> {
    level.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name().cmp(b.name()))
    });

    level
        .into_iter()
        .map(|entry| build_node(entry, children, input))
        .collect()
}

fn build_node(
    entry: &FileEntry,
    children: &HashMap<&Utf8Path, Vec<&FileEntry>>,
    input: &TreeInput<'_>,
) -> TreeNode {
    let is_match = (!input.name_query.is_empty()
        && name_matches(entry.name(), input.name_query, input.case_sensitive))
        || input.content_matches.contains(&entry.path);

    if entry.is_directory {
        let kids = children
            .get(entry.path.as_path())
            .cloned()
            .unwrap_or_default();
        let nodes = build_level(kids, children, input);
        TreeNode {
            name: entry.name().to_string(),
            path: entry.path.clone(),
            is_directory: true,
            is_binary: false,
            size: entry.size,
            selection_state: aggregate_selection(&nodes),
            children: nodes,
            is_expanded: input.expansion.contains(&entry.path),
            is_match,
            is_previewed: false,
        }
    } else {
        TreeNode {
            name: entry.name().to_string(),
            path: entry.path.clone(),
            is_directory: false,
            is_binary: entry.is_binary,
            size: entry.size,
            children: Vec::new(),
            selection_state: if input.selection.contains(&entry.path) {
                SelectionState::Full
            } else {
                SelectionState::None
            },
            is_expanded: false,
            is_match,
            is_previewed: input.previewed == Some(entry.path.as_path()),
        }
    }
}

/// Count (selected, total) descendant files of already projected children
fn count_files(nodes: &[TreeNode]) -> (usize, usize) {
    nodes.iter().fold((0, 0), |(selected, total), node| {
        if node.is_directory {
            let (s, t) = count_files(&node.children);
            (selected + s, total + t)
        } else {
            let hit = usize::from(node.selection_state == SelectionState::Full);
            (selected + hit, total + 1)
        }
    })
}

/// Tri-state of a directory given its projected children
pub fn aggregate_selection(children: &[TreeNode]) -> SelectionState {
    let (selected, total) = count_files(children);
    SelectionState::from_counts(selected, total)
}

/// Tri-state of `dir` computed directly from a flat list and a selection set
pub fn directory_selection(
    entries: &[FileEntry],
    selection: &SelectionSet,
    dir: &Utf8Path,
) -> SelectionState {
    let (selected, total) = entries
        .iter()
        .filter(|e| e.is_file() && e.path.as_path() != dir && e.path.starts_with(dir))
        .fold((0, 0), |(selected, total), e| {
            (selected + usize::from(selection.contains(&e.path)), total + 1)
        });
    SelectionState::from_counts(selected, total)
}
