// State coordination module
//
// The StateCoordinator is a cheap, cloneable handle to a single actor task that owns AppState.
// Commands are queued and applied strictly one at a time; every committed change is broadcast
// as a fresh ViewModel.

mod actor;
pub mod commands;

pub use actor::{STATUS_SCAN_CANCELLED, STATUS_SEARCHING, ignore_pattern_for};
pub use commands::{CoordinatorError, StateEvent, UiCommand};

use crate::metrics::Metrics;
use crate::models::{AppConfig, ViewModel};
use crate::services::scanner::DirectoryScanner;
use actor::{Actor, Request};
use camino::Utf8PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Capacity of the outbound event channel
const EVENT_BUFFER: usize = 256;

/// Handle to the state-owning actor
///
/// # Usage
///
/// - [`spawn()`](Self::spawn) starts the actor on the current tokio runtime
/// - command methods ([`select_directory()`](Self::select_directory), ...) enqueue a
///   [`UiCommand`] and return immediately
/// - [`subscribe()`](Self::subscribe) yields every [`StateEvent`] pushed afterwards
/// - [`view_model()`](Self::view_model) and [`settled()`](Self::settled) observe state after
///   all previously queued commands have been applied
///
/// The actor stops once every handle has been dropped.
#[derive(Clone)]
pub struct StateCoordinator {
    requests: mpsc::UnboundedSender<Request>,
    events: broadcast::Sender<StateEvent>,
    metrics: Arc<Metrics>,
}

impl StateCoordinator {
    /// Start the actor. Must be called from within a tokio runtime.
    pub fn spawn(config: AppConfig, scanner: Arc<dyn DirectoryScanner>) -> Self {
        let (requests, request_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let metrics = Arc::new(Metrics::new());

        let actor = Actor::new(
            config,
            scanner,
            events.clone(),
            Arc::clone(&metrics),
            results_tx,
        );
        tokio::spawn(actor.run(request_rx, results_rx));

        Self {
            requests,
            events,
            metrics,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Queue a command for the actor
    pub fn dispatch(&self, command: UiCommand) -> Result<(), CoordinatorError> {
        self.requests
            .send(Request::Command(command))
            .map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Parse a wire-format command and queue it.
    ///
    /// Malformed input is logged and rejected without touching state.
    pub fn dispatch_json(&self, json: &str) -> Result<(), CoordinatorError> {
        let command: UiCommand = serde_json::from_str(json).map_err(|e| {
            tracing::warn!("Rejecting malformed command: {}", e);
            self.metrics.record_malformed_command();
            CoordinatorError::MalformedCommand(e.to_string())
        })?;
        self.dispatch(command)
    }

    pub fn select_directory(&self, path: impl Into<Utf8PathBuf>) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::SelectDirectory { path: path.into() })
    }

    pub fn rescan_directory(&self) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::RescanDirectory)
    }

    pub fn cancel_scan(&self) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::CancelScan)
    }

    pub fn update_filters(
        &self,
        name_query: impl Into<String>,
        extension_query: impl Into<String>,
        content_query: impl Into<String>,
    ) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::UpdateFilters {
            name_query: name_query.into(),
            extension_query: extension_query.into(),
            content_query: content_query.into(),
        })
    }

    pub fn update_config(&self, config: AppConfig) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::UpdateConfig(config))
    }

    pub fn toggle_selection(&self, path: impl Into<Utf8PathBuf>) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::ToggleSelection { path: path.into() })
    }

    pub fn toggle_directory_selection(
        &self,
        path: impl Into<Utf8PathBuf>,
    ) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::ToggleDirectorySelection { path: path.into() })
    }

    pub fn select_all(&self) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::SelectAll)
    }

    pub fn deselect_all(&self) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::DeselectAll)
    }

    pub fn toggle_expansion(&self, path: impl Into<Utf8PathBuf>) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::ToggleExpansion { path: path.into() })
    }

    pub fn expand_collapse_all(&self, expand: bool) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::ExpandCollapseAll { expand })
    }

    pub fn add_ignore_path(&self, path: impl Into<Utf8PathBuf>) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::AddIgnorePath { path: path.into() })
    }

    pub fn set_preview_path(&self, path: Option<Utf8PathBuf>) -> Result<(), CoordinatorError> {
        self.dispatch(UiCommand::SetPreviewPath { path })
    }

    /// Snapshot of the state after every previously queued command
    pub async fn view_model(&self) -> Result<ViewModel, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Snapshot(reply))
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Selected file paths in sorted order
    pub async fn selected_files(&self) -> Result<Vec<Utf8PathBuf>, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::SelectedFiles(reply))
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Wait for the first view model with no scan or content search in flight.
    ///
    /// Updates older than the state after all previously queued commands are skipped.
    pub async fn settled(&self) -> Result<ViewModel, CoordinatorError> {
        let mut rx = self.subscribe();
        let current = self.view_model().await?;
        if current.is_settled() {
            return Ok(current);
        }
        let floor = current.revision;

        loop {
            match rx.recv().await {
                Ok(StateEvent::StateUpdate(view))
                    if view.revision >= floor && view.is_settled() =>
                {
                    return Ok(*view);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Settled wait lagged by {} events, resyncing", skipped);
                    let current = self.view_model().await?;
                    if current.is_settled() {
                        return Ok(current);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(CoordinatorError::ChannelClosed);
                }
            }
        }
    }
}
