// treesift - cancellable directory indexing with filtered, selection-aware tree views
//
// This is the library crate containing the scanner, filter and tree services plus the state
// coordinator. The binary crate (main.rs) provides a command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{AppConfig, AppState, FileEntry, SelectionState, TreeNode, ViewModel};
pub use services::{DirectoryScanner, FileSystemScanner, ScanError};
pub use state::{CoordinatorError, StateCoordinator, StateEvent, UiCommand};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
