//! Append-only results table and per-session raw log artifacts.
//!
//! Every write goes through one dedicated worker thread so the CSV has a
//! single writer no matter how many sessions finalize at once.

mod layout;

pub use layout::{OutputLayout, RAW_LOGS_DIR_NAME, RESULTS_FILE_NAME};

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use tokio::sync::oneshot;

use crate::models::{RawLog, ResultRecord, RESULT_HEADER};

/// State owned by the writer thread.
pub struct OutputSinks {
    results: csv::Writer<File>,
    layout: OutputLayout,
}

type OutputTask = Box<dyn FnOnce(&mut OutputSinks) + Send + 'static>;

enum OutputCommand {
    Execute(OutputTask),
    Shutdown,
}

struct OutputInner {
    sender: mpsc::Sender<OutputCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OutputInner {
    fn shutdown(&self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(OutputCommand::Shutdown) {
                error!("Failed to send shutdown to output thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join output thread: {join_err:?}");
            }
        }
    }
}

impl Drop for OutputInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Clone)]
pub struct OutputStore {
    inner: Arc<OutputInner>,
    layout: Arc<OutputLayout>,
}

impl OutputStore {
    /// Create the results table (header only) and start the writer thread.
    pub fn open(layout: OutputLayout) -> Result<Self> {
        let mut results = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&layout.results_csv)
            .with_context(|| {
                format!("failed to create results table {}", layout.results_csv.display())
            })?;
        results
            .write_record(RESULT_HEADER)
            .context("failed to write results header")?;
        results.flush().context("failed to flush results header")?;

        let (command_tx, command_rx) = mpsc::channel::<OutputCommand>();
        let mut sinks = OutputSinks {
            results,
            layout: layout.clone(),
        };

        let worker = thread::Builder::new()
            .name("harness-output".into())
            .spawn(move || {
                while let Ok(command) = command_rx.recv() {
                    match command {
                        OutputCommand::Execute(task) => task(&mut sinks),
                        OutputCommand::Shutdown => break,
                    }
                }

                if let Err(err) = sinks.results.flush() {
                    error!("Failed to flush results table on shutdown: {err}");
                }
                info!("Output thread shutting down");
            })
            .context("failed to spawn output worker thread")?;

        info!("Results will be saved to {}", layout.results_dir.display());

        Ok(Self {
            inner: Arc::new(OutputInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            layout: Arc::new(layout),
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn results_path(&self) -> &Path {
        &self.layout.results_csv
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut OutputSinks) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = OutputCommand::Execute(Box::new(move |sinks| {
            let result = task(sinks);
            if reply_tx.send(result).is_err() {
                error!("Output caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|_| anyhow!("output store is closed"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("output thread terminated unexpectedly"))?
    }

    /// Append one row and flush it to disk.
    pub async fn append_result(&self, record: ResultRecord) -> Result<()> {
        self.execute(move |sinks| {
            sinks
                .results
                .serialize(&record)
                .with_context(|| format!("failed to append result for session {}", record.guid))?;
            sinks
                .results
                .flush()
                .context("failed to flush results table")?;
            Ok(())
        })
        .await
    }

    /// Persist a raw log as `raw_logs/run_<guid>.json`.
    pub async fn write_raw_log(&self, raw_log: RawLog) -> Result<PathBuf> {
        self.execute(move |sinks| {
            let path = sinks.layout.raw_log_path(&raw_log.guid);
            let file = File::create(&path)
                .with_context(|| format!("failed to create raw log {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &raw_log)
                .with_context(|| format!("failed to write raw log {}", path.display()))?;
            writer
                .flush()
                .with_context(|| format!("failed to flush raw log {}", path.display()))?;
            Ok(path)
        })
        .await
    }

    /// Flush and stop the writer thread. Later writes fail.
    pub async fn close(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.shutdown())
            .await
            .context("output shutdown worker failed to join")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn store() -> (tempfile::TempDir, OutputStore) {
        let outdir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::prepare(outdir.path(), Local::now()).unwrap();
        (outdir, OutputStore::open(layout).unwrap())
    }

    fn record(guid: &str) -> ResultRecord {
        ResultRecord {
            condition: "live_monitoring".into(),
            test: "log_file_activity".into(),
            run_id: "a.log".into(),
            guid: guid.into(),
            t0_iso: "2024-01-01T00:00:00.000+00:00".into(),
            t1_iso: "2024-01-01T00:00:01.000+00:00".into(),
            duration_ms: 1000,
            cpu_avg_pct: 1.5,
            cpu_peak_pct: 3.0,
            ram_avg_mb: 100.0,
            ram_peak_mb: 120.0,
            sha_before: "n/a".into(),
            sha_after: "n/a".into(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn new_table_has_header_only() {
        let (_dir, store) = store();
        let text = std::fs::read_to_string(store.results_path()).unwrap();
        assert_eq!(text.trim_end(), RESULT_HEADER.join(","));
    }

    #[tokio::test]
    async fn rows_are_appended_in_call_order() {
        let (_dir, store) = store();
        store.append_result(record("first")).await.unwrap();
        store.append_result(record("second")).await.unwrap();

        let mut reader = csv::Reader::from_path(store.results_path()).unwrap();
        let rows: Vec<ResultRecord> = reader.deserialize().map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].guid, "first");
        assert_eq!(rows[1].guid, "second");
    }

    #[tokio::test]
    async fn raw_log_lands_in_raw_logs_dir() {
        let (_dir, store) = store();
        let raw = RawLog {
            guid: "g-1".into(),
            file_path: "/tmp/a.log".into(),
            t0: "t0".into(),
            t1: "t1".into(),
            cpu_samples: vec![1.0, 2.0],
            ram_samples: vec![10.0, 20.0],
        };

        let path = store.write_raw_log(raw.clone()).await.unwrap();
        assert_eq!(path, store.layout().raw_log_path("g-1"));

        let parsed: RawLog = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, raw);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn raw_log_write_failure_is_reported() {
        let (_dir, store) = store();
        let target = store.layout().raw_log_path("full");
        std::os::unix::fs::symlink("/dev/full", &target).unwrap();

        let raw = RawLog {
            guid: "full".into(),
            file_path: "/tmp/a.log".into(),
            t0: "t0".into(),
            t1: "t1".into(),
            cpu_samples: vec![1.0],
            ram_samples: vec![10.0],
        };
        assert!(store.write_raw_log(raw).await.is_err());
    }

    #[tokio::test]
    async fn writes_fail_after_close() {
        let (_dir, store) = store();
        store.close().await.unwrap();
        assert!(store.append_result(record("late")).await.is_err());
    }
}
