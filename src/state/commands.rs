use crate::models::{AppConfig, ScanProgress, ViewModel};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands accepted from the UI collaborator.
///
/// On the wire a command is `{"command": "<name>", "payload": ...}` with camelCase names, e.g.
/// `{"command": "toggleSelection", "payload": {"path": "/r/a/x.txt"}}`. Commands without a
/// payload may omit the `payload` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum UiCommand {
    /// Scan a new root, or rescan if it is already the current one
    SelectDirectory { path: Utf8PathBuf },
    RescanDirectory,
    CancelScan,
    UpdateFilters {
        #[serde(default)]
        name_query: String,
        #[serde(default)]
        extension_query: String,
        #[serde(default)]
        content_query: String,
    },
    /// Replace the whole configuration
    UpdateConfig(AppConfig),
    ToggleSelection { path: Utf8PathBuf },
    ToggleDirectorySelection { path: Utf8PathBuf },
    SelectAll,
    DeselectAll,
    ToggleExpansion { path: Utf8PathBuf },
    ExpandCollapseAll { expand: bool },
    /// Ignore `path` (relative to the root) from now on
    AddIgnorePath { path: Utf8PathBuf },
    /// Report which file the preview collaborator is showing, if any
    SetPreviewPath { path: Option<Utf8PathBuf> },
}

impl UiCommand {
    /// Wire name of the command, for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            UiCommand::SelectDirectory { .. } => "selectDirectory",
            UiCommand::RescanDirectory => "rescanDirectory",
            UiCommand::CancelScan => "cancelScan",
            UiCommand::UpdateFilters { .. } => "updateFilters",
            UiCommand::UpdateConfig(_) => "updateConfig",
            UiCommand::ToggleSelection { .. } => "toggleSelection",
            UiCommand::ToggleDirectorySelection { .. } => "toggleDirectorySelection",
            UiCommand::SelectAll => "selectAll",
            UiCommand::DeselectAll => "deselectAll",
            UiCommand::ToggleExpansion { .. } => "toggleExpansion",
            UiCommand::ExpandCollapseAll { .. } => "expandCollapseAll",
            UiCommand::AddIgnorePath { .. } => "addIgnorePath",
            UiCommand::SetPreviewPath { .. } => "setPreviewPath",
        }
    }
}

/// Events pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum StateEvent {
    /// Fresh snapshot after a committed change
    StateUpdate(Box<ViewModel>),

    ScanProgress(ScanProgress),

    /// User-facing error message
    ShowError(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error("State coordinator is no longer running")]
    ChannelClosed,
}
