//! Generation-scoped cancellation for scans and content searches.
//!
//! Each background operation is tagged with a [`Generation`]. Starting a new operation bumps
//! the tracker, which both cancels every token handed out for older generations and lets the
//! coordinator recognise their late results as stale.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

/// Identifies one background operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Returned by background work that observed its token being cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Tracks which generation is the current expected one
#[derive(Debug, Default)]
pub struct GenerationTracker {
    active: Arc<AtomicU64>,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to a new generation, superseding every older one
    pub fn next_generation(&self) -> Generation {
        Generation(self.active.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> Generation {
        Generation(self.active.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }

    /// Token that reports cancelled once the tracker moves past `generation` or
    /// [`CancellationToken::cancel`] is called
    pub fn token(&self, generation: Generation) -> CancellationToken {
        CancellationToken {
            active: Arc::clone(&self.active),
            generation,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Cooperative cancellation signal polled by background workers
#[derive(Debug, Clone)]
pub struct CancellationToken {
    active: Arc<AtomicU64>,
    generation: Generation,
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that is never cancelled by a tracker
    pub fn noop() -> Self {
        let tracker = GenerationTracker::new();
        tracker.token(tracker.current())
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.active.load(Ordering::Relaxed) != self.generation.0
    }

    /// `?`-friendly check
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Only consult the atomics every `interval` iterations
    pub fn check_sparse(&self, counter: usize, interval: usize) -> Result<(), Cancelled> {
        if interval <= 1 || counter % interval == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::noop()
    }
}
