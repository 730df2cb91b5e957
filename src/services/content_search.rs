//! Parallel file-content matching.
//!
//! Runs on a blocking thread spawned by the coordinator and fans out across the rayon pool.
//! Only regular, non-binary files under the configured size threshold are read. Files that
//! were too large to sniff at scan time are checked again once loaded. Unreadable files simply
//! do not match.

use crate::models::FileEntry;
use crate::services::cancel::{Cancelled, CancellationToken};
use crate::services::scanner::has_binary_head;
use camino::{Utf8Path, Utf8PathBuf};
use memchr::memmem;
use rayon::prelude::*;
use std::collections::HashSet;

/// Inputs for one content search, captured when the search is launched
#[derive(Debug, Clone)]
pub struct ContentSearchRequest {
    pub query: String,
    pub case_sensitive: bool,
    pub candidates: Vec<Utf8PathBuf>,
}

impl ContentSearchRequest {
    pub fn new(query: &str, case_sensitive: bool, entries: &[FileEntry], max_file_size: u64) -> Self {
        Self {
            query: query.to_string(),
            case_sensitive,
            candidates: eligible_candidates(entries, max_file_size),
        }
    }
}

/// Files whose contents may be searched
pub fn eligible_candidates(entries: &[FileEntry], max_file_size: u64) -> Vec<Utf8PathBuf> {
    entries
        .iter()
        .filter(|e| e.is_file() && !e.is_binary && e.size <= max_file_size)
        .map(|e| e.path.clone())
        .collect()
}

/// Search every candidate for the query.
///
/// Returns `Err(Cancelled)` as soon as any worker observes the token cancelled; partial results
/// are dropped.
pub fn search_contents(
    request: &ContentSearchRequest,
    token: &CancellationToken,
) -> Result<HashSet<Utf8PathBuf>, Cancelled> {
    if request.query.is_empty() {
        return Ok(HashSet::new());
    }

    let needle = if request.case_sensitive {
        request.query.clone()
    } else {
        request.query.to_lowercase()
    };
    let finder = memmem::Finder::new(needle.as_bytes());

    let hits: Vec<Option<Utf8PathBuf>> = request
        .candidates
        .par_iter()
        .map(|path| {
            token.check()?;
            let matched = if request.case_sensitive {
                file_contains(path, |bytes| finder.find(bytes).is_some())
            } else {
                file_contains(path, |bytes| {
                    String::from_utf8_lossy(bytes).to_lowercase().contains(&needle)
                })
            };
            Ok(matched.then(|| path.clone()))
        })
        .collect::<Result<_, Cancelled>>()?;

    let matches: HashSet<Utf8PathBuf> = hits.into_iter().flatten().collect();
    tracing::debug!(
        "Content search for '{}' matched {} of {} files",
        request.query,
        matches.len(),
        request.candidates.len()
    );
    Ok(matches)
}

fn file_contains(path: &Utf8Path, predicate: impl Fn(&[u8]) -> bool) -> bool {
    match std::fs::read(path) {
        Ok(bytes) if has_binary_head(&bytes) => {
            tracing::trace!("Skipping binary file {}", path);
            false
        }
        Ok(bytes) => predicate(&bytes),
        Err(e) => {
            tracing::debug!("Skipping unreadable file {}: {}", path, e);
            false
        }
    }
}
