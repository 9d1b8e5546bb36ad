use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

pub const RESULTS_FILE_NAME: &str = "live_results.csv";
pub const RAW_LOGS_DIR_NAME: &str = "raw_logs";

/// Where one harness run writes its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub results_dir: PathBuf,
    pub raw_logs_dir: PathBuf,
    pub results_csv: PathBuf,
}

impl OutputLayout {
    /// `<outdir>/<YYYYMMDD_HHMMSS>/` plus its `raw_logs/` child, created on disk.
    pub fn prepare(outdir: &Path, started_at: DateTime<Local>) -> Result<Self> {
        let results_dir = outdir.join(started_at.format("%Y%m%d_%H%M%S").to_string());
        let raw_logs_dir = results_dir.join(RAW_LOGS_DIR_NAME);

        std::fs::create_dir_all(&raw_logs_dir).with_context(|| {
            format!("failed to create results directory {}", raw_logs_dir.display())
        })?;

        Ok(Self {
            results_csv: results_dir.join(RESULTS_FILE_NAME),
            results_dir,
            raw_logs_dir,
        })
    }

    pub fn raw_log_path(&self, guid: &str) -> PathBuf {
        self.raw_logs_dir.join(format!("run_{guid}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prepare_creates_timestamped_tree() {
        let outdir = tempfile::tempdir().unwrap();
        let stamp = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        let layout = OutputLayout::prepare(outdir.path(), stamp).unwrap();

        assert_eq!(layout.results_dir, outdir.path().join("20240506_070809"));
        assert!(layout.raw_logs_dir.is_dir());
        assert_eq!(
            layout.raw_log_path("abc"),
            layout.raw_logs_dir.join("run_abc.json")
        );
    }
}
