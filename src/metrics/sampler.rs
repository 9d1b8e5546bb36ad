use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::probe::SystemProbe;
use super::types::SampleSeries;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Samples the probe every `period` until `cancel_token` fires.
///
/// The first sample is taken immediately. A sample already running when the
/// token fires is kept; no sample is started after cancellation is observed.
pub async fn sampling_loop(
    probe: Arc<dyn SystemProbe>,
    period: Duration,
    cancel_token: CancellationToken,
) -> SampleSeries {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut series = SampleSeries::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_debug!("sampling loop stopping after {} samples", series.len());
                break;
            }
            _ = ticker.tick() => {
                let probe = Arc::clone(&probe);
                match tokio::task::spawn_blocking(move || probe.sample()).await {
                    Ok(sample) => series.push(sample),
                    Err(err) => log_warn!("resource sample worker failed, sample skipped: {err}"),
                }
            }
        }
    }

    series
}

/// Owns the sampling task of one session.
pub struct ResourceSampler {
    handle: Option<JoinHandle<SampleSeries>>,
    cancel_token: Option<CancellationToken>,
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(&mut self, probe: Arc<dyn SystemProbe>, period: Duration) -> Result<()> {
        if self.handle.is_some() {
            bail!("sampler already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(probe, period, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signal the loop and wait for it to exit, returning everything it
    /// collected. Stopping an idle sampler yields an empty series.
    pub async fn stop(&mut self) -> Result<SampleSeries> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => handle.await.context("sampling task failed to join"),
            None => Ok(SampleSeries::new()),
        }
    }
}

impl Drop for ResourceSampler {
    fn drop(&mut self) {
        // A sampler dropped without `stop` must not keep sampling.
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::ResourceSample;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: AtomicUsize,
    }

    impl SystemProbe for CountingProbe {
        fn sample(&self) -> ResourceSample {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            ResourceSample {
                cpu_percent: n as f32,
                memory_mb: 100.0 + n as f64,
            }
        }
    }

    fn probe() -> Arc<CountingProbe> {
        Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn collects_samples_in_order_until_stopped() {
        let probe = probe();
        let mut sampler = ResourceSampler::new();
        sampler
            .start(probe.clone(), Duration::from_millis(250))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let series = sampler.stop().await.unwrap();

        assert!(series.len() >= 4, "got {} samples", series.len());
        assert_eq!(series.cpu.len(), series.ram_mb.len());
        assert!(series.cpu.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!sampler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn no_samples_after_stop() {
        let probe = probe();
        let mut sampler = ResourceSampler::new();
        sampler
            .start(probe.clone(), Duration::from_millis(100))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        let series = sampler.stop().await.unwrap();
        let taken = probe.calls.load(Ordering::SeqCst);
        assert_eq!(series.len(), taken);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), taken);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut sampler = ResourceSampler::new();
        sampler.start(probe(), Duration::from_millis(50)).unwrap();
        sampler.stop().await.unwrap();

        let again = sampler.stop().await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn refuses_double_start() {
        let mut sampler = ResourceSampler::new();
        sampler.start(probe(), Duration::from_millis(50)).unwrap();
        assert!(sampler.start(probe(), Duration::from_millis(50)).is_err());
        sampler.stop().await.unwrap();
    }
}
