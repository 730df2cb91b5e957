//! Data models for treesift.
//!
//! - [`FileEntry`]: the flat record produced by scanning
//! - [`AppConfig`]: ignore rules, size thresholds and filter options
//! - [`AppState`]: the coordinator-owned state slices (directory, selection, expansion,
//!   queries, task lifecycle)
//! - [`ViewModel`] / [`TreeNode`]: the serializable snapshot pushed to the UI after every
//!   committed change
//!
//! # Architecture Note
//!
//! `AppState` lives inside the [`StateCoordinator`](crate::state::StateCoordinator) actor and
//! is never shared. View types are derived from it on demand and are never cached.

pub mod app_state;
pub mod config;
pub mod file_entry;
pub mod view;

pub use app_state::{
    AppState, DirectoryState, EntryList, ExpansionSet, QueryState, ScanPhase, SelectionSet,
    TaskState,
};
pub use config::AppConfig;
pub use file_entry::FileEntry;
pub use view::{ScanProgress, SelectionState, TreeNode, ViewModel};
