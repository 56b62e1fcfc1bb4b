use super::Service;

/// Selects services touched by a set of changed files
#[derive(Debug, Clone, Default)]
pub struct ChangedFileFilter {
    files: Vec<String>,
}

impl ChangedFileFilter {
    /// Build a filter from a space separated list of repository-relative files.
    ///
    /// An empty list disables filtering.
    pub fn new(files: &str) -> Self {
        Self {
            files: files.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Whether filtering is in effect
    pub fn is_active(&self) -> bool {
        !self.files.is_empty()
    }

    /// True if any changed file lives under the service's directory
    pub fn include(&self, service: &Service) -> bool {
        if !self.is_active() || service.root_dir.is_empty() {
            return true;
        }

        let root = service.root_dir.trim_end_matches('/');
        self.files.iter().any(|file| {
            let file = file.trim_start_matches("./");
            file == root || file.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
        })
    }
}
