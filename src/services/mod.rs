//! Services module - scanning, filtering and tree projection.
//!
//! Everything here is independent of the coordinator: services take explicit inputs and return
//! values, and never touch [`AppState`](crate::models::AppState) directly. Long-running work
//! (directory traversal, content matching) is synchronous and meant to run on a blocking
//! thread, polling a [`CancellationToken`] as it goes.
//!
//! # Components
//!
//! - [`DirectoryScanner`] / [`FileSystemScanner`]: traverse a root, applying configured ignore
//!   patterns and per-directory `.gitignore` files, and report progress
//! - [`FilterEngine`]: name, extension and content predicates with ancestor inclusion and
//!   optional empty-directory pruning
//! - [`search_contents`]: parallel content matching over eligible files
//! - [`project_tree`]: pure projection of the visible list into a [`TreeNode`] forest with
//!   tri-state selection
//!
//! [`TreeNode`]: crate::models::TreeNode

pub mod cancel;
pub mod content_search;
pub mod filter;
pub mod ignore_rules;
pub mod scanner;
pub mod tree;

pub use cancel::{Cancelled, CancellationToken, Generation, GenerationTracker};
pub use content_search::{ContentSearchRequest, search_contents};
pub use filter::{FilterEngine, FilterOutcome};
pub use ignore_rules::{IgnoreRules, IgnoreVerdict};
pub use scanner::{
    DirectoryScanner, FileSystemScanner, ScanError, ScanOutcome, ScanRequest, ScanStats,
};
pub use tree::{TreeInput, aggregate_selection, directory_selection, project_tree};
