use serde::{Deserialize, Serialize};

/// Default size threshold above which file contents are never read (1 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Default number of scanned entries between progress reports and cancellation checks
pub const DEFAULT_PROGRESS_INTERVAL: usize = 256;

/// User-facing configuration for scanning and filtering.
///
/// Loaded from `treesift.yaml` by [`ConfigManager`](crate::config::ConfigManager) and
/// replaced wholesale through the `updateConfig` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// gitignore-style patterns applied on top of any per-directory `.gitignore` files
    pub ignore_patterns: Vec<String>,

    /// Honor `.gitignore` files discovered while scanning
    pub use_gitignore: bool,

    /// Files larger than this (bytes) are listed but never sniffed or content-searched
    pub max_file_size: u64,

    pub case_sensitive: bool,

    /// Drop directories left without children after filtering
    pub hide_empty_dirs: bool,

    pub progress_interval: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: vec![
                ".git/".to_string(),
                "node_modules/".to_string(),
                "target/".to_string(),
                "__pycache__/".to_string(),
                ".DS_Store".to_string(),
            ],
            use_gitignore: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            case_sensitive: false,
            hide_empty_dirs: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl AppConfig {
    /// Check whether switching to `other` changes which entries a scan would produce
    pub fn scan_rules_differ(&self, other: &AppConfig) -> bool {
        self.ignore_patterns != other.ignore_patterns
            || self.use_gitignore != other.use_gitignore
            || self.max_file_size != other.max_file_size
    }

    /// Check whether switching to `other` invalidates content search results
    pub fn content_rules_differ(&self, other: &AppConfig) -> bool {
        self.case_sensitive != other.case_sensitive || self.max_file_size != other.max_file_size
    }

    /// Add an ignore pattern unless it is already configured.
    ///
    /// Returns true if the pattern was added.
    pub fn add_ignore_pattern(&mut self, pattern: &str) -> bool {
        if self.ignore_patterns.iter().any(|p| p == pattern) {
            return false;
        }
        self.ignore_patterns.push(pattern.to_string());
        true
    }
}
