//! Tool context: shared state available to the built-in tools.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for HTTP fetches.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared context the built-in tools are constructed with.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Directory relative paths are resolved against.
    pub working_dir: PathBuf,
    /// HTTP client used by `fetch`.
    pub http: reqwest::Client,
    /// Per-request timeout used by `fetch`.
    pub fetch_timeout: Duration,
}

impl ToolContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            http: reqwest::Client::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Resolve a tool-supplied path against the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}
