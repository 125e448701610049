use std::sync::Mutex;

/// Counters shared by the filtering workers and the volumetric consumer.
pub struct PipelineMetrics {
    inner: Mutex<Counters>,
}

#[derive(Default)]
struct Counters {
    planes_filtered: u64,
    worker_failures: u64,
    cells_emitted: u64,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub planes_filtered: u64,
    pub worker_failures: u64,
    pub cells_emitted: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters::default()),
        }
    }

    pub fn record_plane_filtered(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.planes_filtered += 1;
        }
    }

    pub fn record_worker_failure(&self) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.worker_failures += 1;
        }
    }

    pub fn record_cells(&self, count: u64) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.cells_emitted += count;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(counters) = self.inner.lock() {
            MetricsSnapshot {
                planes_filtered: counters.planes_filtered,
                worker_failures: counters.worker_failures,
                cells_emitted: counters.cells_emitted,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counts() {
        let metrics = PipelineMetrics::new();
        metrics.record_plane_filtered();
        metrics.record_plane_filtered();
        metrics.record_worker_failure();
        metrics.record_cells(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.planes_filtered, 2);
        assert_eq!(snapshot.worker_failures, 1);
        assert_eq!(snapshot.cells_emitted, 3);
    }
}
