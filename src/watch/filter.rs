use std::path::Path;

/// Decides whether a path is a log file worth monitoring: an existing regular
/// file whose extension is in the allow-list (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileFilter {
    extensions: Vec<String>,
}

impl LogFileFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Name check only, no filesystem access.
    pub fn matches_name(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }

    pub fn is_log_file(&self, path: &Path) -> bool {
        self.matches_name(path) && path.is_file()
    }
}

impl Default for LogFileFilter {
    fn default() -> Self {
        Self::new(["log", "txt"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_accepts_log_and_txt_any_case() {
        let filter = LogFileFilter::default();
        assert!(filter.matches_name(Path::new("/x/run.log")));
        assert!(filter.matches_name(Path::new("/x/RUN.TXT")));
        assert!(!filter.matches_name(Path::new("/x/run.csv")));
        assert!(!filter.matches_name(Path::new("/x/log")));
    }

    #[test]
    fn extensions_are_normalised() {
        let filter = LogFileFilter::new([".JSONL", " out ", ""]);
        assert_eq!(filter.extensions(), ["jsonl", "out"]);
        assert!(filter.matches_name(Path::new("trace.jsonl")));
    }

    #[test]
    fn directories_are_not_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested.log");
        std::fs::create_dir(&sub).unwrap();
        let file = dir.path().join("real.log");
        std::fs::write(&file, b"x").unwrap();

        let filter = LogFileFilter::default();
        assert!(!filter.is_log_file(&sub));
        assert!(filter.is_log_file(&file));
    }
}
