//! Integration tests for the StateCoordinator actor
//!
//! These tests verify that the coordinator:
//! - Scans a real directory tree and reports completion status
//! - Applies name, content and ignore filters with ancestor inclusion
//! - Derives tri-state directory selection and restricts bulk selection to visible files
//! - Treats cancellation as idempotent
//! - Discards results from superseded scans
//! - Restarts an in-flight scan when ignore rules change

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, mpsc};
use tempfile::TempDir;
use tokio::time::{Duration, sleep, timeout};
use treesift::models::{AppConfig, FileEntry, ScanProgress, SelectionState, ViewModel};
use treesift::services::{DirectoryScanner, ScanError, ScanOutcome, ScanRequest, ScanStats};
use treesift::services::CancellationToken;
use treesift::{CoordinatorError, FileSystemScanner, StateCoordinator, StateEvent};

/// Root with `a/x.txt`, `a/y.txt` and `b/z.txt`
fn fixture() -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(fs::canonicalize(temp.path()).unwrap()).unwrap();
    fs::create_dir_all(root.join("a")).unwrap();
    fs::create_dir_all(root.join("b")).unwrap();
    fs::write(root.join("a/x.txt"), "alpha needle").unwrap();
    fs::write(root.join("a/y.txt"), "beta").unwrap();
    fs::write(root.join("b/z.txt"), "gamma").unwrap();
    (temp, root)
}

fn coordinator() -> StateCoordinator {
    StateCoordinator::spawn(AppConfig::default(), Arc::new(FileSystemScanner::new()))
}

async fn settle(coordinator: &StateCoordinator) -> ViewModel {
    timeout(Duration::from_secs(10), coordinator.settled())
        .await
        .expect("Timeout waiting for settled state")
        .expect("Coordinator stopped")
}

async fn scanned(root: &Utf8Path) -> StateCoordinator {
    let coordinator = coordinator();
    coordinator.select_directory(root).unwrap();
    let view = settle(&coordinator).await;
    assert_eq!(view.total_count, 5, "unexpected scan result: {:?}", view.status_message);
    coordinator
}

fn state_of(view: &ViewModel, path: &Utf8Path) -> SelectionState {
    view.find(path.as_str())
        .unwrap_or_else(|| panic!("{} missing from tree", path))
        .selection_state
}

/// Wait until the stale-result counter reaches `expected`
async fn wait_for_stale(coordinator: &StateCoordinator, expected: u64) {
    timeout(Duration::from_secs(10), async {
        while coordinator
            .metrics()
            .stale_results_discarded
            .load(Ordering::Relaxed)
            < expected
        {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timeout waiting for stale result");
}

#[tokio::test]
async fn test_scan_completes_with_status() {
    let (_temp, root) = fixture();
    let coordinator = coordinator();
    let mut rx = coordinator.subscribe();

    coordinator.select_directory(&root).unwrap();
    let view = settle(&coordinator).await;

    assert_eq!(view.current_path.as_deref(), Some(root.as_path()));
    assert_eq!(view.status_message, "Scan complete. Found 5 items.");
    assert!(!view.is_scanning);
    let top: Vec<_> = view.tree.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(top, vec!["a", "b"]);

    // The first event reflects the scan starting
    let event = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    match event {
        StateEvent::StateUpdate(view) => assert!(view.is_scanning),
        other => panic!("Expected StateUpdate, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_name_filter_keeps_ancestors_only() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.update_filters("x", "", "").unwrap();
    let view = settle(&coordinator).await;

    assert_eq!(view.visible_count, 2);
    let a = view.find(root.join("a").as_str()).expect("ancestor kept");
    assert!(a.is_expanded, "ancestor of a match is auto-expanded");
    assert!(view.find(root.join("a/x.txt").as_str()).unwrap().is_match);
    assert!(view.find(root.join("a/y.txt").as_str()).is_none());
    assert!(view.find(root.join("b").as_str()).is_none());

    // Clearing the query never collapses what was expanded
    coordinator.update_filters("", "", "").unwrap();
    let view = settle(&coordinator).await;
    assert_eq!(view.visible_count, 5);
    assert!(view.find(root.join("a").as_str()).unwrap().is_expanded);
}

#[tokio::test]
async fn test_tri_state_selection_scenario() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;
    let a = root.join("a");

    coordinator.toggle_selection(root.join("a/x.txt")).unwrap();
    let view = coordinator.view_model().await.unwrap();
    assert_eq!(state_of(&view, &a), SelectionState::Partial);

    coordinator.toggle_selection(root.join("a/y.txt")).unwrap();
    let view = coordinator.view_model().await.unwrap();
    assert_eq!(state_of(&view, &a), SelectionState::Full);
    assert_eq!(state_of(&view, &root.join("b")), SelectionState::None);
    assert_eq!(view.selected_size, 16);

    coordinator.toggle_directory_selection(&a).unwrap();
    let view = coordinator.view_model().await.unwrap();
    assert_eq!(state_of(&view, &a), SelectionState::None);
    assert_eq!(view.selected_count, 0);
}

#[tokio::test]
async fn test_toggle_directory_twice_restores_selection() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;
    let a = root.join("a");

    coordinator.toggle_directory_selection(&a).unwrap();
    assert_eq!(
        coordinator.selected_files().await.unwrap(),
        vec![root.join("a/x.txt"), root.join("a/y.txt")]
    );

    coordinator.toggle_directory_selection(&a).unwrap();
    assert!(coordinator.selected_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_partial_directory_toggle_selects_rest() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.toggle_selection(root.join("a/x.txt")).unwrap();
    coordinator.toggle_directory_selection(root.join("a")).unwrap();

    let view = coordinator.view_model().await.unwrap();
    assert_eq!(state_of(&view, &root.join("a")), SelectionState::Full);
    assert_eq!(view.selected_count, 2);
}

#[tokio::test]
async fn test_select_all_only_touches_visible_files() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.update_filters("x", "", "").unwrap();
    coordinator.select_all().unwrap();
    assert_eq!(
        coordinator.selected_files().await.unwrap(),
        vec![root.join("a/x.txt")]
    );

    coordinator.update_filters("", "", "").unwrap();
    coordinator.toggle_selection(root.join("b/z.txt")).unwrap();
    coordinator.update_filters("z", "", "").unwrap();
    coordinator.deselect_all().unwrap();
    assert_eq!(
        coordinator.selected_files().await.unwrap(),
        vec![root.join("a/x.txt")]
    );
}

#[tokio::test]
async fn test_cancel_without_scan_is_idempotent() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.cancel_scan().unwrap();
    coordinator.cancel_scan().unwrap();
    let view = coordinator.view_model().await.unwrap();

    assert_eq!(view.status_message, "Scan cancelled.");
    assert_eq!(view.total_count, 5);
    assert!(!view.is_scanning);
    assert_eq!(
        coordinator.metrics().scans_cancelled.load(Ordering::Relaxed),
        0
    );
}

#[tokio::test]
async fn test_invalid_root_reports_error() {
    let (_temp, root) = fixture();
    let coordinator = coordinator();
    let mut rx = coordinator.subscribe();

    coordinator.select_directory(root.join("missing")).unwrap();

    let message = timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(StateEvent::ShowError(message)) = rx.recv().await {
                return message;
            }
        }
    })
    .await
    .expect("Timeout waiting for ShowError");
    assert!(message.contains("missing"));

    let view = coordinator.view_model().await.unwrap();
    assert!(view.status_message.starts_with("Error: "));
    assert!(view.current_path.is_none());
    assert_eq!(view.total_count, 0);

    // A file is not a valid root either
    coordinator.select_directory(root.join("a/x.txt")).unwrap();
    let view = coordinator.view_model().await.unwrap();
    assert!(view.current_path.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_root_validation_on_multi_thread_runtime() {
    let (_temp, root) = fixture();
    let coordinator = coordinator();

    coordinator.select_directory(root.join("missing")).unwrap();
    let view = coordinator.view_model().await.unwrap();
    assert!(view.status_message.starts_with("Error: "));

    coordinator.select_directory(&root).unwrap();
    let view = settle(&coordinator).await;
    assert_eq!(view.current_path.as_deref(), Some(root.as_path()));
    assert_eq!(view.total_count, 5);
}

#[tokio::test]
async fn test_add_ignore_path_refilters_and_deselects() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.toggle_selection(root.join("a/x.txt")).unwrap();
    coordinator.toggle_selection(root.join("b/z.txt")).unwrap();
    coordinator.add_ignore_path(root.join("a")).unwrap();

    let view = coordinator.view_model().await.unwrap();
    assert!(view.config.ignore_patterns.contains(&"/a/".to_string()));
    assert!(view.find(root.join("a").as_str()).is_none());
    assert_eq!(view.visible_count, 2);
    assert_eq!(
        coordinator.selected_files().await.unwrap(),
        vec![root.join("b/z.txt")]
    );
}

#[tokio::test]
async fn test_add_ignore_path_treats_brackets_literally() {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(fs::canonicalize(temp.path()).unwrap()).unwrap();
    fs::write(root.join("a[1].txt"), "bracketed").unwrap();
    fs::write(root.join("a1.txt"), "plain").unwrap();

    let coordinator = coordinator();
    coordinator.select_directory(&root).unwrap();
    settle(&coordinator).await;
    coordinator.toggle_selection(root.join("a[1].txt")).unwrap();
    coordinator.toggle_selection(root.join("a1.txt")).unwrap();

    coordinator.add_ignore_path(root.join("a[1].txt")).unwrap();
    let view = coordinator.view_model().await.unwrap();

    assert_eq!(names(&view), vec!["a1.txt"]);
    assert_eq!(
        coordinator.selected_files().await.unwrap(),
        vec![root.join("a1.txt")]
    );
}

#[tokio::test]
async fn test_content_search_filters_visible_list() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.update_filters("", "", "NEEDLE").unwrap();
    let view = settle(&coordinator).await;

    assert_eq!(view.status_message, "Content search complete. 1 matching files.");
    assert_eq!(view.visible_count, 2);
    let x = view.find(root.join("a/x.txt").as_str()).unwrap();
    assert!(x.is_match);
    assert!(view.find(root.join("a").as_str()).unwrap().is_expanded);
    assert_eq!(
        coordinator.metrics().content_searches.load(Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn test_settled_reflects_every_queued_command() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator
        .update_config(AppConfig {
            hide_empty_dirs: true,
            ..AppConfig::default()
        })
        .unwrap();
    coordinator.update_filters("", "", "needle").unwrap();
    let view = settle(&coordinator).await;

    assert_eq!(view.content_query, "needle");
    assert!(view.config.hide_empty_dirs);
    assert_eq!(view.status_message, "Content search complete. 1 matching files.");
    assert_eq!(view.visible_count, 2);
}

#[tokio::test]
async fn test_oversized_binary_file_is_not_content_matched() {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(fs::canonicalize(temp.path()).unwrap()).unwrap();
    let mut contents = b"needle\0".to_vec();
    contents.resize(2048, b'z');
    fs::write(root.join("blob.dat"), &contents).unwrap();
    fs::write(root.join("notes.txt"), "needle").unwrap();

    let small = AppConfig {
        max_file_size: 1024,
        ..AppConfig::default()
    };
    let coordinator =
        StateCoordinator::spawn(small.clone(), Arc::new(FileSystemScanner::new()));
    coordinator.select_directory(&root).unwrap();
    settle(&coordinator).await;

    // Raising the threshold while idle does not rescan
    coordinator
        .update_config(AppConfig {
            max_file_size: 1024 * 1024,
            ..small
        })
        .unwrap();
    coordinator.update_filters("", "", "needle").unwrap();
    let view = settle(&coordinator).await;

    assert_eq!(names(&view), vec!["notes.txt"]);
    assert_eq!(view.status_message, "Content search complete. 1 matching files.");
}

#[tokio::test]
async fn test_scan_progress_reaches_subscribers() {
    let (_temp, root) = fixture();
    let coordinator = StateCoordinator::spawn(
        AppConfig {
            progress_interval: 1,
            ..AppConfig::default()
        },
        Arc::new(FileSystemScanner::new()),
    );
    let mut rx = coordinator.subscribe();

    coordinator.select_directory(&root).unwrap();
    let mut progress = Vec::new();
    timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await.expect("Channel closed") {
                StateEvent::ScanProgress(p) => progress.push(p),
                StateEvent::StateUpdate(view) if !view.is_scanning => break,
                _ => {}
            }
        }
    })
    .await
    .expect("Timeout waiting for scan to finish");

    assert!(!progress.is_empty());
    let last = progress.last().unwrap();
    assert_eq!(last.files_scanned, 5);
    assert!(last.current_scanning_path.is_none());
}

#[tokio::test]
async fn test_rescan_keeps_selection_and_prunes_deleted() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.toggle_selection(root.join("a/x.txt")).unwrap();
    coordinator.toggle_selection(root.join("a/y.txt")).unwrap();
    fs::remove_file(root.join("a/y.txt")).unwrap();

    coordinator.rescan_directory().unwrap();
    let view = settle(&coordinator).await;

    assert_eq!(view.total_count, 4);
    assert_eq!(
        coordinator.selected_files().await.unwrap(),
        vec![root.join("a/x.txt")]
    );
}

#[tokio::test]
async fn test_selecting_new_root_clears_selection() {
    let (_temp, root) = fixture();
    let (_other_temp, other) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.toggle_selection(root.join("a/x.txt")).unwrap();
    coordinator.expand_collapse_all(true).unwrap();
    coordinator.select_directory(&other).unwrap();
    let view = settle(&coordinator).await;

    assert_eq!(view.current_path.as_deref(), Some(other.as_path()));
    assert_eq!(view.selected_count, 0);
    assert!(view.tree.iter().all(|n| !n.is_expanded));
}

#[tokio::test]
async fn test_expansion_and_preview() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    coordinator.expand_collapse_all(true).unwrap();
    coordinator.toggle_expansion(root.join("b")).unwrap();
    coordinator
        .set_preview_path(Some(root.join("a/y.txt")))
        .unwrap();

    let view = coordinator.view_model().await.unwrap();
    assert!(view.find(root.join("a").as_str()).unwrap().is_expanded);
    assert!(!view.find(root.join("b").as_str()).unwrap().is_expanded);
    assert!(view.find(root.join("a/y.txt").as_str()).unwrap().is_previewed);
    assert_eq!(view.previewed_path, Some(root.join("a/y.txt")));

    coordinator.expand_collapse_all(false).unwrap();
    coordinator.set_preview_path(None).unwrap();
    let view = coordinator.view_model().await.unwrap();
    assert!(view.tree.iter().all(|n| !n.is_expanded));
    assert!(view.previewed_path.is_none());
}

#[tokio::test]
async fn test_update_config_hides_empty_directories() {
    let (_temp, root) = fixture();
    fs::create_dir_all(root.join("c")).unwrap();
    let coordinator = coordinator();
    coordinator.select_directory(&root).unwrap();
    assert_eq!(settle(&coordinator).await.total_count, 6);

    coordinator
        .update_config(AppConfig {
            hide_empty_dirs: true,
            ..AppConfig::default()
        })
        .unwrap();
    let view = coordinator.view_model().await.unwrap();

    assert!(view.config.hide_empty_dirs);
    assert!(view.find(root.join("c").as_str()).is_none());
    assert_eq!(view.visible_count, 5);
    assert_eq!(view.total_count, 6);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let (_temp, root) = fixture();
    let coordinator = scanned(&root).await;

    let err = coordinator
        .dispatch_json(r#"{"command":"toggleSelection","payload":{"file":1}}"#)
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::MalformedCommand(_)));
    assert_eq!(
        coordinator.metrics().malformed_commands.load(Ordering::Relaxed),
        1
    );
    assert_eq!(coordinator.view_model().await.unwrap().selected_count, 0);

    coordinator
        .dispatch_json(r#"{"command":"selectAll"}"#)
        .unwrap();
    assert_eq!(coordinator.view_model().await.unwrap().selected_count, 3);
}

// ---- scripted scanner for deterministic staleness ----

struct Script {
    gate: Option<mpsc::Receiver<()>>,
    entries: Vec<FileEntry>,
}

/// Returns pre-baked results in call order, optionally blocking until a gate opens
struct ScriptedScanner {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ScanRequest>>,
}

impl ScriptedScanner {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ScanRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl DirectoryScanner for ScriptedScanner {
    fn scan(
        &self,
        request: &ScanRequest,
        _cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(ScanProgress),
    ) -> Result<ScanOutcome, ScanError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected scan");

        // Ignores cancellation on purpose, to deliver a late result
        if let Some(gate) = script.gate {
            let _ = gate.recv();
        }

        on_progress(ScanProgress {
            files_scanned: script.entries.len(),
            ..ScanProgress::default()
        });
        Ok(ScanOutcome {
            entries: script.entries,
            active_ignore_patterns: Vec::new(),
            stats: ScanStats::default(),
        })
    }
}

/// Wait until the scanner has been entered `expected` times
async fn wait_for_scans(scanner: &ScriptedScanner, expected: usize) {
    timeout(Duration::from_secs(10), async {
        while scanner.requests.lock().unwrap().len() < expected {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timeout waiting for scan to start");
}

fn names(view: &ViewModel) -> Vec<String> {
    view.tree.iter().map(|n| n.name.clone()).collect()
}

#[tokio::test]
async fn test_late_result_of_superseded_scan_is_discarded() {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(fs::canonicalize(temp.path()).unwrap()).unwrap();
    let (gate_tx, gate_rx) = mpsc::channel();

    let scanner = ScriptedScanner::new(vec![
        Script {
            gate: Some(gate_rx),
            entries: vec![FileEntry::file(root.join("old.txt"), 1, false)],
        },
        Script {
            gate: None,
            entries: vec![FileEntry::file(root.join("new.txt"), 1, false)],
        },
    ]);
    let coordinator = StateCoordinator::spawn(AppConfig::default(), scanner.clone());

    // Scan A blocks; scan B supersedes it and finishes first
    coordinator.select_directory(&root).unwrap();
    wait_for_scans(&scanner, 1).await;
    coordinator.rescan_directory().unwrap();
    let view = settle(&coordinator).await;
    assert_eq!(names(&view), vec!["new.txt"]);

    gate_tx.send(()).unwrap();
    wait_for_stale(&coordinator, 1).await;

    let view = coordinator.view_model().await.unwrap();
    assert_eq!(names(&view), vec!["new.txt"]);
    assert_eq!(view.status_message, "Scan complete. Found 1 items.");
}

#[tokio::test]
async fn test_cancelled_scan_result_is_discarded() {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(fs::canonicalize(temp.path()).unwrap()).unwrap();
    let (gate_tx, gate_rx) = mpsc::channel();

    let scanner = ScriptedScanner::new(vec![Script {
        gate: Some(gate_rx),
        entries: vec![FileEntry::file(root.join("late.txt"), 1, false)],
    }]);
    let coordinator = StateCoordinator::spawn(AppConfig::default(), scanner);

    coordinator.select_directory(&root).unwrap();
    assert!(coordinator.view_model().await.unwrap().is_scanning);

    coordinator.cancel_scan().unwrap();
    let view = coordinator.view_model().await.unwrap();
    assert!(!view.is_scanning);
    assert_eq!(view.status_message, "Scan cancelled.");

    gate_tx.send(()).unwrap();
    wait_for_stale(&coordinator, 1).await;

    let view = coordinator.view_model().await.unwrap();
    assert_eq!(view.total_count, 0);
    assert_eq!(view.status_message, "Scan cancelled.");
    assert_eq!(
        coordinator.metrics().scans_cancelled.load(Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn test_ignore_change_mid_scan_restarts_with_new_patterns() {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(fs::canonicalize(temp.path()).unwrap()).unwrap();
    let (gate_tx, gate_rx) = mpsc::channel();

    let scanner = ScriptedScanner::new(vec![
        Script {
            gate: Some(gate_rx),
            entries: vec![FileEntry::file(root.join("debug.log"), 1, false)],
        },
        Script {
            gate: None,
            entries: vec![FileEntry::file(root.join("main.rs"), 1, false)],
        },
    ]);
    let coordinator = StateCoordinator::spawn(AppConfig::default(), scanner.clone());

    coordinator.select_directory(&root).unwrap();
    wait_for_scans(&scanner, 1).await;
    assert!(coordinator.view_model().await.unwrap().is_scanning);

    let mut config = AppConfig::default();
    config.add_ignore_pattern("*.log");
    coordinator.update_config(config.clone()).unwrap();
    let view = settle(&coordinator).await;
    assert_eq!(names(&view), vec!["main.rs"]);

    gate_tx.send(()).unwrap();
    wait_for_stale(&coordinator, 1).await;

    let requests = scanner.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].ignore_patterns, AppConfig::default().ignore_patterns);
    assert_eq!(requests[1].ignore_patterns, config.ignore_patterns);
    assert_eq!(
        coordinator.metrics().scans_started.load(Ordering::Relaxed),
        2
    );
}
