use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::session::Session;

/// Column order of the results table.
pub const RESULT_HEADER: [&str; 14] = [
    "condition",
    "test",
    "run_id",
    "guid",
    "t0_iso",
    "t1_iso",
    "duration_ms",
    "cpu_avg_pct",
    "cpu_peak_pct",
    "ram_avg_mb",
    "ram_peak_mb",
    "sha_before",
    "sha_after",
    "notes",
];

/// Free-text tags stamped on every record of a harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLabels {
    pub condition: String,
    pub test: String,
    pub notes: String,
}

/// One row of the results table. Field order must match [`RESULT_HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub condition: String,
    pub test: String,
    pub run_id: String,
    pub guid: String,
    pub t0_iso: String,
    pub t1_iso: String,
    pub duration_ms: i64,
    pub cpu_avg_pct: f64,
    pub cpu_peak_pct: f64,
    pub ram_avg_mb: f64,
    pub ram_peak_mb: f64,
    pub sha_before: String,
    pub sha_after: String,
    pub notes: String,
}

impl ResultRecord {
    pub fn from_session(session: &Session, labels: &RecordLabels) -> Result<Self> {
        let ended_at = session
            .ended_at
            .ok_or_else(|| anyhow!("session {} has not been finalized", session.id))?;
        let cpu = session.series.cpu_stats();
        let ram = session.series.ram_stats();

        Ok(Self {
            condition: labels.condition.clone(),
            test: labels.test.clone(),
            run_id: session.run_id(),
            guid: session.id.clone(),
            t0_iso: iso_millis(&session.started_at),
            t1_iso: iso_millis(&ended_at),
            duration_ms: ended_at
                .signed_duration_since(session.started_at)
                .num_milliseconds()
                .max(0),
            cpu_avg_pct: round2(cpu.average),
            cpu_peak_pct: round2(cpu.peak),
            ram_avg_mb: round2(ram.average),
            ram_peak_mb: round2(ram.peak),
            sha_before: session.hash_before.clone(),
            sha_after: session.hash_after.clone().unwrap_or_default(),
            notes: labels.notes.clone(),
        })
    }
}

/// Unaggregated samples of one session, persisted as its own artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub guid: String,
    pub file_path: String,
    pub t0: String,
    pub t1: String,
    pub cpu_samples: Vec<f32>,
    pub ram_samples: Vec<f64>,
}

impl RawLog {
    pub fn from_session(session: &Session) -> Result<Self> {
        let ended_at = session
            .ended_at
            .ok_or_else(|| anyhow!("session {} has not been finalized", session.id))?;

        Ok(Self {
            guid: session.id.clone(),
            file_path: session.file_path.to_string_lossy().into_owned(),
            t0: iso_millis(&session.started_at),
            t1: iso_millis(&ended_at),
            cpu_samples: session.series.cpu.clone(),
            ram_samples: session.series.ram_mb.clone(),
        })
    }
}

pub fn iso_millis(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, false)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
