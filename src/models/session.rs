use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::metrics::SampleSeries;

/// One file's monitored lifetime. Lives only inside its FileMonitor and is
/// dropped once the result record and raw log are written.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub file_path: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, at finalize.
    pub ended_at: Option<DateTime<Utc>>,
    pub hash_before: String,
    pub hash_after: Option<String>,
    pub series: SampleSeries,
}

impl Session {
    pub fn new(file_path: PathBuf, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_path,
            started_at,
            ended_at: None,
            hash_before: String::new(),
            hash_after: None,
            series: SampleSeries::new(),
        }
    }

    /// File basename, used as the run identifier.
    pub fn run_id(&self) -> String {
        basename(&self.file_path)
    }

    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended_at| ended_at.signed_duration_since(self.started_at).num_milliseconds())
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn run_id_is_basename() {
        let session = Session::new(PathBuf::from("/var/log/app/run-7.log"), Utc::now());
        assert_eq!(session.run_id(), "run-7.log");
    }

    #[test]
    fn duration_only_after_finalize() {
        let started_at = Utc::now();
        let mut session = Session::new(PathBuf::from("a.log"), started_at);
        assert_eq!(session.duration_ms(), None);

        session.ended_at = Some(started_at + Duration::milliseconds(1234));
        assert_eq!(session.duration_ms(), Some(1234));
        assert!(session.is_finalized());
    }

    #[test]
    fn ids_are_unique() {
        let a = Session::new(PathBuf::from("a.log"), Utc::now());
        let b = Session::new(PathBuf::from("a.log"), Utc::now());
        assert_ne!(a.id, b.id);
    }
}
