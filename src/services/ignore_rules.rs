//! gitignore-style ignore rules.
//!
//! Two layers feed exclusion decisions:
//! - configured patterns from [`AppConfig::ignore_patterns`](crate::models::AppConfig), rooted
//!   at the scanned root, which take precedence
//! - `.gitignore` files discovered per directory while walking, deepest first
//!
//! Matching reports the original pattern text so the scanner can list which patterns were
//! actually responsible for excluding something.

use camino::{Utf8Path, Utf8PathBuf};
use ignore::Match;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::sync::Arc;

/// Outcome of matching one path against a rule set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreVerdict {
    /// Excluded by the given pattern
    Ignored(String),
    /// Explicitly re-included by a negated pattern
    Whitelisted,
    Unmatched,
}

impl IgnoreVerdict {
    fn from_match(m: Match<&ignore::gitignore::Glob>) -> Self {
        match m {
            Match::Ignore(glob) => IgnoreVerdict::Ignored(glob.original().to_string()),
            Match::Whitelist(_) => IgnoreVerdict::Whitelisted,
            Match::None => IgnoreVerdict::Unmatched,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, IgnoreVerdict::Ignored(_))
    }
}

/// Compiled configured patterns for one root
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: Utf8PathBuf,
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Compile `patterns` relative to `root`.
    ///
    /// Invalid globs are logged and skipped; they never fail the compilation.
    pub fn compile(root: &Utf8Path, patterns: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root.as_std_path());
        for pattern in patterns {
            let line = pattern.trim();
            if line.is_empty() {
                continue;
            }
            if let Err(e) = builder.add_line(None, line) {
                tracing::warn!("Skipping invalid ignore pattern '{}': {}", line, e);
            }
        }

        let matcher = builder.build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build ignore matcher for {}: {}", root, e);
            Gitignore::empty()
        });

        Self {
            root: root.to_path_buf(),
            matcher,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    /// Match a single path, without considering its parents
    pub fn matched(&self, path: &Utf8Path, is_dir: bool) -> IgnoreVerdict {
        if self.matcher.is_empty() || !path.starts_with(&self.root) {
            return IgnoreVerdict::Unmatched;
        }
        IgnoreVerdict::from_match(self.matcher.matched(path.as_std_path(), is_dir))
    }

    /// Check whether `path` or any ancestor directory below the root is ignored
    pub fn is_excluded(&self, path: &Utf8Path, is_dir: bool) -> bool {
        if self.matcher.is_empty() || !path.starts_with(&self.root) || path == self.root.as_path() {
            return false;
        }

        let mut ancestors: Vec<&Utf8Path> = path
            .ancestors()
            .skip(1)
            .take_while(|a| *a != self.root.as_path())
            .collect();
        ancestors.reverse();

        ancestors
            .into_iter()
            .any(|dir| self.matched(dir, true).is_ignored())
            || self.matched(path, is_dir).is_ignored()
    }
}

/// Stack of `.gitignore` matchers collected on the way down to a directory
#[derive(Debug, Clone, Default)]
pub struct GitignoreStack {
    layers: Vec<Arc<Gitignore>>,
}

impl GitignoreStack {
    /// Return a copy extended with `dir/.gitignore`, if that file exists and parses
    pub fn descend(&self, dir: &Utf8Path) -> Self {
        let candidate = dir.join(".gitignore");
        if !candidate.is_file() {
            return self.clone();
        }

        let (matcher, err) = Gitignore::new(candidate.as_std_path());
        if let Some(e) = err {
            tracing::warn!("Problems reading {}: {}", candidate, e);
        }

        let mut next = self.clone();
        if !matcher.is_empty() {
            tracing::debug!("Loaded {} rules from {}", matcher.num_ignores(), candidate);
            next.layers.push(Arc::new(matcher));
        }
        next
    }

    /// Deepest decisive match wins
    pub fn matched(&self, path: &Utf8Path, is_dir: bool) -> IgnoreVerdict {
        for layer in self.layers.iter().rev() {
            let verdict = IgnoreVerdict::from_match(layer.matched(path.as_std_path(), is_dir));
            if verdict != IgnoreVerdict::Unmatched {
                return verdict;
            }
        }
        IgnoreVerdict::Unmatched
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

/// Configured rules take precedence over discovered `.gitignore` rules
pub fn resolve(
    rules: &IgnoreRules,
    gitignores: &GitignoreStack,
    path: &Utf8Path,
    is_dir: bool,
) -> IgnoreVerdict {
    match rules.matched(path, is_dir) {
        IgnoreVerdict::Unmatched => gitignores.matched(path, is_dir),
        decisive => decisive,
    }
}
