// Single-owner state actor
//
// All AppState mutation happens here, one message at a time. Scans and content searches run on
// blocking threads and report back through the results channel tagged with their generation;
// results whose generation is no longer current are dropped.

use crate::metrics::Metrics;
use crate::models::{AppConfig, AppState, ScanPhase, ScanProgress, SelectionState, ViewModel};
use crate::services::cancel::{Cancelled, CancellationToken, Generation, GenerationTracker};
use crate::services::content_search::{ContentSearchRequest, search_contents};
use crate::services::filter::FilterEngine;
use crate::services::ignore_rules::IgnoreRules;
use crate::services::scanner::{DirectoryScanner, ScanError, ScanOutcome, ScanRequest};
use crate::services::tree::{TreeInput, directory_selection, project_tree};
use crate::state::commands::{StateEvent, UiCommand};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::RuntimeFlavor;
use tokio::sync::{broadcast, mpsc, oneshot};

pub const STATUS_SCAN_CANCELLED: &str = "Scan cancelled.";
pub const STATUS_SEARCHING: &str = "Searching file contents...";

/// Requests sent by [`StateCoordinator`](super::StateCoordinator) handles
#[derive(Debug)]
pub(crate) enum Request {
    Command(UiCommand),
    Snapshot(oneshot::Sender<ViewModel>),
    SelectedFiles(oneshot::Sender<Vec<Utf8PathBuf>>),
}

/// Results reported by background workers
#[derive(Debug)]
pub(crate) enum WorkerResult {
    ScanProgress {
        generation: Generation,
        progress: ScanProgress,
    },
    ScanFinished {
        generation: Generation,
        result: Result<ScanOutcome, ScanError>,
    },
    SearchFinished {
        generation: Generation,
        result: Result<HashSet<Utf8PathBuf>, Cancelled>,
    },
}

pub(crate) struct Actor {
    state: AppState,
    scanner: Arc<dyn DirectoryScanner>,
    events: broadcast::Sender<StateEvent>,
    metrics: Arc<Metrics>,
    results_tx: mpsc::UnboundedSender<WorkerResult>,
    scan_generations: GenerationTracker,
    search_generations: GenerationTracker,
    scan_token: Option<CancellationToken>,
    search_token: Option<CancellationToken>,
    scan_started_at: Option<Instant>,
    revision: u64,
    /// Whether the in-flight content search reports its own status messages
    announce_search: bool,
}

impl Actor {
    pub(crate) fn new(
        config: AppConfig,
        scanner: Arc<dyn DirectoryScanner>,
        events: broadcast::Sender<StateEvent>,
        metrics: Arc<Metrics>,
        results_tx: mpsc::UnboundedSender<WorkerResult>,
    ) -> Self {
        Self {
            state: AppState::new(config),
            scanner,
            events,
            metrics,
            results_tx,
            scan_generations: GenerationTracker::new(),
            search_generations: GenerationTracker::new(),
            scan_token: None,
            search_token: None,
            scan_started_at: None,
            revision: 0,
            announce_search: false,
        }
    }

    /// Process requests and worker results until every handle is dropped
    pub(crate) async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        mut results: mpsc::UnboundedReceiver<WorkerResult>,
    ) {
        tracing::debug!("State coordinator started");
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                Some(result) = results.recv() => self.handle_result(result),
            }
        }

        self.cancel_background_work();
        tracing::debug!("State coordinator stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Command(command) => self.handle_command(command),
            Request::Snapshot(reply) => {
                let _ = reply.send(self.view_model());
            }
            Request::SelectedFiles(reply) => {
                let _ = reply.send(self.state.selection.iter().cloned().collect());
            }
        }
    }

    pub(crate) fn handle_command(&mut self, command: UiCommand) {
        tracing::debug!("Handling command {}", command.name());

        match command {
            UiCommand::SelectDirectory { path } => self.select_directory(&path),
            UiCommand::RescanDirectory => self.rescan_directory(),
            UiCommand::CancelScan => self.cancel_scan(),
            UiCommand::UpdateFilters {
                name_query,
                extension_query,
                content_query,
            } => self.update_filters(name_query, extension_query, content_query),
            UiCommand::UpdateConfig(config) => self.update_config(config),
            UiCommand::ToggleSelection { path } => self.toggle_selection(&path),
            UiCommand::ToggleDirectorySelection { path } => self.toggle_directory_selection(&path),
            UiCommand::SelectAll => self.select_all(),
            UiCommand::DeselectAll => self.deselect_all(),
            UiCommand::ToggleExpansion { path } => self.toggle_expansion(&path),
            UiCommand::ExpandCollapseAll { expand } => self.expand_collapse_all(expand),
            UiCommand::AddIgnorePath { path } => self.add_ignore_path(&path),
            UiCommand::SetPreviewPath { path } => self.set_preview_path(path),
        }

        self.push_view_model();
    }

    fn handle_result(&mut self, result: WorkerResult) {
        match result {
            WorkerResult::ScanProgress {
                generation,
                progress,
            } => {
                if !self.scan_generations.is_current(generation) || !self.state.task.is_scanning() {
                    tracing::trace!("Dropping progress from stale scan {}", generation);
                    return;
                }
                tracing::trace!("Scan {} progress: {} entries", generation, progress.files_scanned);
                self.state.task.progress = progress.clone();
                self.emit(StateEvent::ScanProgress(progress));
            }
            WorkerResult::ScanFinished { generation, result } => {
                if !self.scan_generations.is_current(generation) || !self.state.task.is_scanning() {
                    tracing::trace!("Discarding result of stale scan {}", generation);
                    self.metrics.record_stale_result();
                    return;
                }
                self.finish_scan(result);
                self.push_view_model();
                self.state.task.settle();
            }
            WorkerResult::SearchFinished { generation, result } => {
                if !self.search_generations.is_current(generation) {
                    tracing::trace!("Discarding result of stale content search {}", generation);
                    self.metrics.record_stale_result();
                    return;
                }
                self.finish_search(result);
                self.push_view_model();
            }
        }
    }

    // ---- scan lifecycle ----

    fn select_directory(&mut self, path: &Utf8Path) {
        let root = match self.validate_root(path) {
            Ok(root) => root,
            Err(e) => {
                tracing::error!("Cannot select {}: {}", path, e);
                self.report_error(e.to_string());
                return;
            }
        };

        if self.state.directory.current_path.as_deref() == Some(root.as_path()) {
            tracing::info!("Rescanning current root {}", root);
        } else {
            tracing::info!("Selected new root {}", root);
            self.cancel_search();
            self.state.reset_for_new_root();
            self.state.directory.current_path = Some(root.clone());
            self.recompute_filters();
        }

        self.start_scan(root);
    }

    /// Canonicalize a candidate root. This touches the filesystem, so on a multi-threaded
    /// runtime the worker hands its other tasks off while it blocks.
    fn validate_root(&self, path: &Utf8Path) -> Result<Utf8PathBuf, ScanError> {
        let flavor = tokio::runtime::Handle::try_current().map(|h| h.runtime_flavor());
        match flavor {
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| self.scanner.validate_root(path))
            }
            _ => self.scanner.validate_root(path),
        }
    }

    fn rescan_directory(&mut self) {
        match self.state.directory.current_path.clone() {
            Some(root) => self.start_scan(root),
            None => {
                tracing::warn!("Rescan requested with no directory selected");
                self.report_error("No directory selected".to_string());
            }
        }
    }

    fn start_scan(&mut self, root: Utf8PathBuf) {
        let generation = self.scan_generations.next_generation();
        if let Some(previous) = self.scan_token.take() {
            previous.cancel();
        }
        let token = self.scan_generations.token(generation);
        self.scan_token = Some(token.clone());

        self.state.task.begin_scan();
        self.state.status_message = format!("Scanning {}...", root);
        self.scan_started_at = Some(Instant::now());
        self.metrics.record_scan_started();
        tracing::info!("Starting scan {} of {}", generation, root);

        let request = ScanRequest::from_config(root, &self.state.config);
        let scanner = Arc::clone(&self.scanner);
        let results = self.results_tx.clone();

        tokio::task::spawn_blocking(move || {
            let progress_tx = results.clone();
            let mut on_progress = move |progress: ScanProgress| {
                let _ = progress_tx.send(WorkerResult::ScanProgress {
                    generation,
                    progress,
                });
            };
            let result = scanner.scan(&request, &token, &mut on_progress);
            let _ = results.send(WorkerResult::ScanFinished { generation, result });
        });
    }

    fn finish_scan(&mut self, result: Result<ScanOutcome, ScanError>) {
        self.scan_token = None;
        let elapsed = self.scan_started_at.take().map(|t| t.elapsed());

        match result {
            Ok(outcome) => {
                self.state.task.finish(ScanPhase::Completed);
                self.state.task.progress = ScanProgress {
                    files_scanned: outcome.stats.files_scanned,
                    large_files_skipped: outcome.stats.large_files_skipped,
                    current_scanning_path: None,
                };
                self.state.directory.full_file_list = outcome.entries.into();
                self.state.directory.active_ignore_patterns = outcome.active_ignore_patterns;

                let pruned = self.state.prune_stale_paths();
                if pruned > 0 {
                    tracing::debug!("Pruned {} stale selected paths", pruned);
                }

                let count = self.state.directory.full_file_list.len();
                self.state.status_message = format!("Scan complete. Found {} items.", count);
                self.metrics
                    .record_scan_completed(elapsed.unwrap_or_default());
                tracing::info!(
                    "Scan complete: {} items, {} I/O errors",
                    count,
                    outcome.stats.io_errors
                );

                if self.state.query.has_content_query() {
                    self.launch_content_search(false);
                }
                self.recompute_filters();
            }
            Err(ScanError::Cancelled) => {
                self.state.task.finish(ScanPhase::Cancelled);
                self.state.status_message = STATUS_SCAN_CANCELLED.to_string();
                self.metrics.record_scan_cancelled();
                tracing::info!("Scan cancelled by worker");
            }
            Err(e) => {
                self.state.task.finish(ScanPhase::Error);
                self.metrics.record_scan_failed();
                tracing::error!("Scan failed: {}", e);
                self.report_error(e.to_string());
            }
        }
    }

    fn cancel_scan(&mut self) {
        if self.state.task.is_scanning() {
            self.scan_generations.next_generation();
            if let Some(token) = self.scan_token.take() {
                token.cancel();
            }
            self.scan_started_at = None;
            self.state.task.finish(ScanPhase::Cancelled);
            self.metrics.record_scan_cancelled();
            tracing::info!("Scan cancelled");
        } else {
            tracing::debug!("Cancel requested with no active scan");
        }

        self.state.status_message = STATUS_SCAN_CANCELLED.to_string();
        self.state.task.settle();
    }

    // ---- filtering ----

    fn update_filters(&mut self, name_query: String, extension_query: String, content_query: String) {
        let content_changed = content_query != self.state.query.content_query;

        self.state.query.name_query = name_query;
        self.state.query.extension_query = extension_query;
        self.state.query.content_query = content_query;

        if content_changed {
            if self.state.query.has_content_query() {
                self.launch_content_search(true);
            } else {
                self.cancel_search();
                self.state.query.content_matches.clear();
            }
        }

        self.recompute_filters();
    }

    fn update_config(&mut self, config: AppConfig) {
        let scan_changed = self.state.config.scan_rules_differ(&config);
        let content_changed = self.state.config.content_rules_differ(&config);
        self.state.config = config;
        tracing::info!("Configuration updated");

        if scan_changed && self.state.task.is_scanning() {
            if let Some(root) = self.state.directory.current_path.clone() {
                tracing::info!("Ignore rules changed mid-scan, restarting");
                self.start_scan(root);
            }
        }

        if content_changed && self.state.query.has_content_query() {
            self.launch_content_search(true);
        }

        self.recompute_filters();
    }

    fn launch_content_search(&mut self, announce: bool) {
        let generation = self.search_generations.next_generation();
        if let Some(previous) = self.search_token.take() {
            previous.cancel();
        }
        let token = self.search_generations.token(generation);
        self.search_token = Some(token.clone());

        self.state.query.content_matches.clear();
        self.state.query.is_searching = true;
        self.announce_search = announce;
        if announce {
            self.state.status_message = STATUS_SEARCHING.to_string();
        }
        self.metrics.record_content_search();

        let request = ContentSearchRequest::new(
            &self.state.query.content_query,
            self.state.config.case_sensitive,
            &self.state.directory.full_file_list,
            self.state.config.max_file_size,
        );
        tracing::debug!(
            "Starting content search {} over {} files",
            generation,
            request.candidates.len()
        );

        let results = self.results_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = search_contents(&request, &token);
            let _ = results.send(WorkerResult::SearchFinished { generation, result });
        });
    }

    fn finish_search(&mut self, result: Result<HashSet<Utf8PathBuf>, Cancelled>) {
        self.search_token = None;
        self.state.query.is_searching = false;

        match result {
            Ok(matches) => {
                let count = matches.len();
                self.state.query.content_matches = matches;
                if self.announce_search {
                    self.state.status_message =
                        format!("Content search complete. {} matching files.", count);
                }
                tracing::info!("Content search complete: {} matches", count);
            }
            Err(Cancelled) => tracing::debug!("Content search cancelled by worker"),
        }

        self.recompute_filters();
    }

    fn cancel_search(&mut self) {
        if let Some(token) = self.search_token.take() {
            self.search_generations.next_generation();
            token.cancel();
        }
        self.state.query.is_searching = false;
    }

    fn cancel_background_work(&mut self) {
        if let Some(token) = self.scan_token.take() {
            token.cancel();
        }
        if let Some(token) = self.search_token.take() {
            token.cancel();
        }
    }

    fn recompute_filters(&mut self) {
        let engine = FilterEngine::new(
            &self.state.query,
            &self.state.config,
            self.state.directory.current_path.as_deref(),
        );
        let outcome = engine.apply(
            &self.state.directory.full_file_list,
            &self.state.query.content_matches,
        );
        self.state.directory.filtered_file_list = outcome.visible.into();
        self.state.expansion.extend(outcome.auto_expand);
    }

    // ---- selection and expansion ----

    fn toggle_selection(&mut self, path: &Utf8Path) {
        match self.state.directory.entry(path) {
            Some(entry) if entry.is_file() => {
                let selected = self.state.selection.toggle(path);
                tracing::debug!("{} {}", if selected { "Selected" } else { "Deselected" }, path);
            }
            Some(_) => tracing::warn!("toggleSelection on directory {} ignored", path),
            None => tracing::warn!("toggleSelection on unknown path {} ignored", path),
        }
    }

    fn toggle_directory_selection(&mut self, path: &Utf8Path) {
        if !self
            .state
            .directory
            .visible_entry(path)
            .is_some_and(|e| e.is_directory)
        {
            tracing::warn!("toggleDirectorySelection on unknown directory {} ignored", path);
            return;
        }

        let current = directory_selection(
            &self.state.directory.filtered_file_list,
            &self.state.selection,
            path,
        );
        let files: Vec<Utf8PathBuf> = self
            .state
            .directory
            .visible_files_under(path)
            .map(|e| e.path.clone())
            .collect();

        if current == SelectionState::Full {
            for file in &files {
                self.state.selection.remove(file);
            }
        } else {
            self.state.selection.extend(files);
        }
    }

    fn select_all(&mut self) {
        let visible: Vec<Utf8PathBuf> = self
            .state
            .directory
            .filtered_file_list
            .iter()
            .filter(|e| e.is_file())
            .map(|e| e.path.clone())
            .collect();
        tracing::debug!("Selecting {} visible files", visible.len());
        self.state.selection.extend(visible);
    }

    fn deselect_all(&mut self) {
        let visible: HashSet<&Utf8Path> = self
            .state
            .directory
            .filtered_file_list
            .iter()
            .filter(|e| e.is_file())
            .map(|e| e.path.as_path())
            .collect();
        self.state.selection.retain(|p| !visible.contains(p));
    }

    fn toggle_expansion(&mut self, path: &Utf8Path) {
        if self
            .state
            .directory
            .visible_entry(path)
            .is_some_and(|e| e.is_directory)
        {
            self.state.expansion.toggle(path);
        } else {
            tracing::warn!("toggleExpansion on unknown directory {} ignored", path);
        }
    }

    fn expand_collapse_all(&mut self, expand: bool) {
        let directories = self
            .state
            .directory
            .filtered_file_list
            .iter()
            .filter(|e| e.is_directory);

        for dir in directories {
            if expand {
                self.state.expansion.insert(dir.path.clone());
            } else {
                self.state.expansion.remove(&dir.path);
            }
        }
    }

    fn add_ignore_path(&mut self, path: &Utf8Path) {
        let Some(root) = self.state.directory.current_path.clone() else {
            self.report_error("No directory selected".to_string());
            return;
        };

        let pattern = match ignore_pattern_for(&root, path, self.is_directory(path)) {
            Some(pattern) => pattern,
            None => {
                tracing::warn!("addIgnorePath: {} is not below {}", path, root);
                self.report_error(format!("{} is not inside {}", path, root));
                return;
            }
        };

        if !self.state.config.add_ignore_pattern(&pattern) {
            tracing::debug!("Ignore pattern '{}' already configured", pattern);
        } else {
            tracing::info!("Added ignore pattern '{}'", pattern);
        }

        let rules = IgnoreRules::compile(&root, &self.state.config.ignore_patterns);
        let removed = self
            .state
            .selection
            .retain(|p| !rules.is_excluded(p, false));
        if removed > 0 {
            tracing::debug!("Deselected {} newly ignored files", removed);
        }
        if self
            .state
            .previewed_path
            .as_deref()
            .is_some_and(|p| rules.is_excluded(p, false))
        {
            self.state.previewed_path = None;
        }

        self.recompute_filters();
    }

    fn is_directory(&self, path: &Utf8Path) -> bool {
        match self.state.directory.entry(path) {
            Some(entry) => entry.is_directory,
            None => path.is_dir(),
        }
    }

    fn set_preview_path(&mut self, path: Option<Utf8PathBuf>) {
        match path {
            Some(path) if !self.state.directory.entry(&path).is_some_and(|e| e.is_file()) => {
                tracing::warn!("setPreviewPath on unknown file {} ignored", path);
            }
            path => self.state.previewed_path = path,
        }
    }

    // ---- outbound ----

    fn report_error(&mut self, message: String) {
        self.state.status_message = format!("Error: {}", message);
        self.emit(StateEvent::ShowError(message));
    }

    pub(crate) fn view_model(&self) -> ViewModel {
        let state = &self.state;
        let tree = project_tree(&TreeInput {
            root: state.directory.current_path.as_deref(),
            entries: &state.directory.filtered_file_list,
            selection: &state.selection,
            expansion: &state.expansion,
            content_matches: &state.query.content_matches,
            name_query: &state.query.name_query,
            case_sensitive: state.config.case_sensitive,
            previewed: state.previewed_path.as_deref(),
        });

        ViewModel {
            revision: self.revision,
            config: state.config.clone(),
            current_path: state.directory.current_path.clone(),
            tree,
            total_count: state.directory.full_file_list.len(),
            visible_count: state.directory.filtered_file_list.len(),
            selected_count: state.selection.len(),
            selected_size: state.selected_size(),
            is_scanning: state.task.is_scanning(),
            is_searching: state.query.is_searching,
            status_message: state.status_message.clone(),
            name_query: state.query.name_query.clone(),
            extension_query: state.query.extension_query.clone(),
            content_query: state.query.content_query.clone(),
            active_ignore_patterns: state.directory.active_ignore_patterns.clone(),
            previewed_path: state.previewed_path.clone(),
        }
    }

    fn push_view_model(&mut self) {
        self.revision += 1;
        self.metrics.record_view_model_pushed();
        self.emit(StateEvent::StateUpdate(Box::new(self.view_model())));
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is not an error for the actor
        if self.events.send(event).is_err() {
            self.metrics.record_broadcast_error();
        }
    }
}

/// Root-anchored gitignore pattern for `path`, with a trailing slash for directories.
///
/// Glob metacharacters in the path are escaped so the pattern matches that path literally.
pub fn ignore_pattern_for(root: &Utf8Path, path: &Utf8Path, is_dir: bool) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_str().is_empty() {
        return None;
    }

    let mut pattern = String::with_capacity(relative.as_str().len() + 2);
    for component in relative.components() {
        pattern.push('/');
        escape_glob_into(component.as_str(), &mut pattern);
    }
    if is_dir {
        pattern.push('/');
    }
    Some(pattern)
}

fn escape_glob_into(name: &str, out: &mut String) {
    for c in name.chars() {
        if matches!(c, '[' | ']' | '*' | '?' | '{' | '}' | '\\' | '!' | '#') {
            out.push('\\');
        }
        out.push(c);
    }
    // gitignore strips unescaped trailing spaces
    let trailing = name.len() - name.trim_end_matches(' ').len();
    if trailing > 0 {
        out.truncate(out.len() - trailing);
        for _ in 0..trailing {
            out.push_str("\\ ");
        }
    }
}
