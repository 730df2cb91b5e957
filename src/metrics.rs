// Coordinator metrics
//
// Lock-free counters describing scan, search and view-update activity

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Activity counters shared between the coordinator handle and its actor.
///
/// Uses relaxed atomics; values are informational and only ever increase.
#[derive(Debug)]
pub struct Metrics {
    /// Scans launched (select, rescan or config-triggered restart)
    pub scans_started: AtomicU64,

    pub scans_completed: AtomicU64,

    pub scans_cancelled: AtomicU64,

    /// Scans that ended with a fatal error such as an invalid root
    pub scans_failed: AtomicU64,

    pub content_searches: AtomicU64,

    /// Background results dropped because their generation was superseded
    pub stale_results_discarded: AtomicU64,

    /// View models pushed to subscribers
    pub view_models_pushed: AtomicU64,

    /// Outbound sends with no live subscriber
    pub broadcast_errors: AtomicU64,

    /// Inbound commands rejected as malformed
    pub malformed_commands: AtomicU64,

    /// Total wall time of completed scans in milliseconds
    pub total_scan_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            scans_started: AtomicU64::new(0),
            scans_completed: AtomicU64::new(0),
            scans_cancelled: AtomicU64::new(0),
            scans_failed: AtomicU64::new(0),
            content_searches: AtomicU64::new(0),
            stale_results_discarded: AtomicU64::new(0),
            view_models_pushed: AtomicU64::new(0),
            broadcast_errors: AtomicU64::new(0),
            malformed_commands: AtomicU64::new(0),
            total_scan_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_scan_started(&self) {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed scan and its duration
    pub fn record_scan_completed(&self, duration: Duration) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        self.total_scan_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_scan_cancelled(&self) {
        self.scans_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_failed(&self) {
        self.scans_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_content_search(&self) {
        self.content_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_result(&self) {
        self.stale_results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_view_model_pushed(&self) {
        self.view_models_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast_error(&self) {
        self.broadcast_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_command(&self) {
        self.malformed_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average completed scan time in milliseconds
    pub fn avg_scan_time_ms(&self) -> f64 {
        let total = self.total_scan_time_ms.load(Ordering::Relaxed);
        let count = self.scans_completed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Coordinator Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Scans: {} started, {} completed, {} cancelled, {} failed (avg: {:.2}ms)",
            self.scans_started.load(Ordering::Relaxed),
            self.scans_completed.load(Ordering::Relaxed),
            self.scans_cancelled.load(Ordering::Relaxed),
            self.scans_failed.load(Ordering::Relaxed),
            self.avg_scan_time_ms()
        );
        tracing::info!(
            "Content searches: {}, stale results discarded: {}",
            self.content_searches.load(Ordering::Relaxed),
            self.stale_results_discarded.load(Ordering::Relaxed)
        );
        tracing::info!(
            "View models pushed: {}, broadcast errors: {}, malformed commands: {}",
            self.view_models_pushed.load(Ordering::Relaxed),
            self.broadcast_errors.load(Ordering::Relaxed),
            self.malformed_commands.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
