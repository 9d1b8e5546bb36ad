#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

/// CPU and RAM samples of one session, in sampling order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    pub cpu: Vec<f32>,
    pub ram_mb: Vec<f64>,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: ResourceSample) {
        self.cpu.push(sample.cpu_percent);
        self.ram_mb.push(sample.memory_mb);
    }

    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    pub fn cpu_stats(&self) -> SeriesStats {
        SeriesStats::from_values(self.cpu.iter().map(|value| f64::from(*value)))
    }

    pub fn ram_stats(&self) -> SeriesStats {
        SeriesStats::from_values(self.ram_mb.iter().copied())
    }
}

/// Average and peak over a series. Empty input gives zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeriesStats {
    pub average: f64,
    pub peak: f64,
    pub count: usize,
}

impl SeriesStats {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut sum = 0.0;
        let mut peak = f64::NEG_INFINITY;
        let mut count = 0usize;

        for value in values {
            sum += value;
            peak = peak.max(value);
            count += 1;
        }

        if count == 0 {
            return Self::default();
        }

        Self {
            average: sum / count as f64,
            peak,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_series_reports_zero() {
        let series = SampleSeries::new();
        assert_eq!(series.cpu_stats(), SeriesStats::default());
        assert_eq!(series.ram_stats().average, 0.0);
        assert_eq!(series.ram_stats().peak, 0.0);
    }

    #[test]
    fn stats_track_average_and_peak() {
        let mut series = SampleSeries::new();
        for (cpu, ram) in [(10.0, 100.0), (30.0, 300.0), (20.0, 200.0)] {
            series.push(ResourceSample {
                cpu_percent: cpu,
                memory_mb: ram,
            });
        }

        let cpu = series.cpu_stats();
        assert_eq!(cpu.count, 3);
        assert!((cpu.average - 20.0).abs() < 1e-9);
        assert_eq!(cpu.peak, 30.0);

        let ram = series.ram_stats();
        assert!((ram.average - 200.0).abs() < 1e-9);
        assert_eq!(ram.peak, 300.0);
    }
}
