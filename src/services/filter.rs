use crate::models::{AppConfig, FileEntry, QueryState};
use crate::services::ignore_rules::IgnoreRules;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Separators accepted between extension tokens, e.g. `rs, toml; md`
static EXTENSION_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;\s]+").expect("Invalid extension separator regex"));

/// Fold `text` for comparison according to the case-sensitivity flag
pub fn fold_case(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

/// Substring match of `query` against a file name. An empty query matches everything.
pub fn name_matches(name: &str, query: &str, case_sensitive: bool) -> bool {
    if query.is_empty() {
        return true;
    }
    if case_sensitive {
        name.contains(query)
    } else {
        name.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Split an extension query into `.ext` suffixes.
///
/// `"*.rs, .toml;md"` becomes `[".rs", ".toml", ".md"]`.
pub fn parse_extensions(query: &str, case_sensitive: bool) -> Vec<String> {
    EXTENSION_SEPARATOR
        .split(query.trim())
        .map(|token| token.trim_start_matches('*').trim_start_matches('.'))
        .filter(|token| !token.is_empty())
        .map(|token| format!(".{}", fold_case(token, case_sensitive)))
        .collect()
}

/// Result of one synchronous filter pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Retained entries, in the order of the input list
    pub visible: Vec<FileEntry>,
    /// Directories to mark expanded because they lead to a name or content match
    pub auto_expand: Vec<Utf8PathBuf>,
    pub direct_matches: usize,
}

/// Compiled name/extension/content/ignore predicates for one filter pass.
///
/// Content matching itself happens in [`content_search`](crate::services::content_search);
/// this engine only consults the committed match set.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    name_query: String,
    extensions: Vec<String>,
    content_active: bool,
    case_sensitive: bool,
    hide_empty_dirs: bool,
    ignore: Option<IgnoreRules>,
}

impl FilterEngine {
    pub fn new(query: &QueryState, config: &AppConfig, root: Option<&Utf8Path>) -> Self {
        let ignore = root
            .map(|root| IgnoreRules::compile(root, &config.ignore_patterns))
            .filter(|rules| !rules.is_empty());

        Self {
            name_query: fold_case(&query.name_query, config.case_sensitive),
            extensions: parse_extensions(&query.extension_query, config.case_sensitive),
            content_active: query.has_content_query(),
            case_sensitive: config.case_sensitive,
            hide_empty_dirs: config.hide_empty_dirs,
            ignore,
        }
    }

    /// Whether any name, extension or content query narrows the list
    pub fn has_query(&self) -> bool {
        !self.name_query.is_empty() || !self.extensions.is_empty() || self.content_active
    }

    fn expands_matches(&self) -> bool {
        !self.name_query.is_empty() || self.content_active
    }

    fn is_ignored(&self, entry: &FileEntry) -> bool {
        self.ignore
            .as_ref()
            .is_some_and(|rules| rules.is_excluded(&entry.path, entry.is_directory))
    }

    /// Direct predicate, without ancestor inclusion
    pub fn matches(&self, entry: &FileEntry, content_matches: &HashSet<Utf8PathBuf>) -> bool {
        let name = fold_case(entry.name(), self.case_sensitive);

        if !self.name_query.is_empty() && !name.contains(&self.name_query) {
            return false;
        }
        if !self.extensions.is_empty() && !self.extensions.iter().any(|ext| name.ends_with(ext)) {
            return false;
        }
        if self.content_active {
            return !entry.is_directory && content_matches.contains(&entry.path);
        }
        true
    }

    /// Produce the visible list from the full list.
    ///
    /// Every output entry comes from `entries`. A directory survives if it matches directly or
    /// any retained entry lies below it. With `hide_empty_dirs`, directories left without any
    /// child are dropped in one non-cascading pass.
    pub fn apply(
        &self,
        entries: &[FileEntry],
        content_matches: &HashSet<Utf8PathBuf>,
    ) -> FilterOutcome {
        let candidates: Vec<&FileEntry> = entries.iter().filter(|e| !self.is_ignored(e)).collect();
        let directories: HashSet<&Utf8Path> = candidates
            .iter()
            .filter(|e| e.is_directory)
            .map(|e| e.path.as_path())
            .collect();

        let mut retained: HashSet<&Utf8Path> = HashSet::new();
        let mut expand: HashSet<&Utf8Path> = HashSet::new();
        let mut direct_matches = 0;

        for entry in &candidates {
            if !self.matches(entry, content_matches) {
                continue;
            }
            direct_matches += 1;
            retained.insert(entry.path.as_path());

            for ancestor in entry.path.ancestors().skip(1) {
                if !directories.contains(ancestor) {
                    break;
                }
                if self.expands_matches() {
                    expand.insert(ancestor);
                }
                if !retained.insert(ancestor) && !self.expands_matches() {
                    break;
                }
            }
        }

        let mut visible: Vec<FileEntry> = candidates
            .into_iter()
            .filter(|e| retained.contains(e.path.as_path()))
            .cloned()
            .collect();

        if self.hide_empty_dirs {
            visible = prune_empty_directories(visible);
        }

        let visible_dirs: HashSet<&Utf8Path> = visible
            .iter()
            .filter(|e| e.is_directory)
            .map(|e| e.path.as_path())
            .collect();
        let mut auto_expand: Vec<Utf8PathBuf> = expand
            .into_iter()
            .filter(|dir| visible_dirs.contains(dir))
            .map(Utf8Path::to_path_buf)
            .collect();
        auto_expand.sort();

        tracing::debug!(
            "Filter pass kept {} of {} entries ({} direct matches, {} to expand)",
            visible.len(),
            entries.len(),
            direct_matches,
            auto_expand.len()
        );

        FilterOutcome {
            visible,
            auto_expand,
            direct_matches,
        }
    }
}

/// Remove directories with no child in `entries`. Directories emptied by this pass survive.
pub fn prune_empty_directories(entries: Vec<FileEntry>) -> Vec<FileEntry> {
    let parents: HashSet<Utf8PathBuf> = entries
        .iter()
        .filter_map(|e| e.parent().map(Utf8Path::to_path_buf))
        .collect();

    entries
        .into_iter()
        .filter(|e| !e.is_directory || parents.contains(&e.path))
        .collect()
}
