//! Two-stage parallel detection pipeline.
//!
//! A pool of plane-filtering workers feeds one long-lived volumetric
//! consumer through a bounded channel whose capacity equals the consumer's
//! window depth. The ordering gate serializes pushes so channel order always
//! equals plane order, however the workers happen to finish, and a single
//! sentinel closes the stream once the last worker has joined.

pub mod consumer;
pub mod gate;
pub mod message;
pub mod window;
mod worker;

pub use consumer::{ConsumerReport, ConsumerState};
pub use gate::OrderingGate;
pub use message::{PlaneFailure, PlaneMessage, PlaneResult, PlaneTask};
pub use window::RollingWindow;

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded};
use log::{debug, info};

use crate::filters::calibration::calibrate;
use crate::filters::IntensityPlaneFilter;
use crate::prelude::{
    DetectError, DetectResult, DetectionConfig, DetectionSink, PlaneFilter, PlaneSource,
    VolumeFilter,
};
use crate::telemetry::{MetricsSnapshot, PipelineMetrics};

use self::consumer::VolumeConsumer;
use self::worker::{run_worker, WorkerContext};

/// Completion summary for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub planes_processed: u64,
    pub cells_emitted: u64,
    pub consumer_state: ConsumerState,
}

/// Orchestrates calibration, the worker pool, and the volumetric consumer
/// for one single-pass detection run.
pub struct DetectionPipeline {
    config: DetectionConfig,
    plane_filter: Arc<dyn PlaneFilter>,
    metrics: Arc<PipelineMetrics>,
}

impl DetectionPipeline {
    pub fn new(config: DetectionConfig) -> Self {
        Self::with_plane_filter(config, Arc::new(IntensityPlaneFilter::new()))
    }

    pub fn with_plane_filter(config: DetectionConfig, plane_filter: Arc<dyn PlaneFilter>) -> Self {
        Self {
            config,
            plane_filter,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Runs the full plane range through both filtering stages.
    ///
    /// Completion is reported only after every worker and the consumer have
    /// joined; the first error raised anywhere in the run is returned.
    pub fn run(
        &self,
        source: Arc<dyn PlaneSource>,
        volume_filter: Box<dyn VolumeFilter>,
        sink: Box<dyn DetectionSink>,
    ) -> DetectResult<PipelineReport> {
        let config = &self.config;
        if config.plane_start >= config.plane_end {
            return Err(DetectError::EmptyRange {
                start: config.plane_start,
                end: config.plane_end,
            });
        }

        // One-time calibration from the first plane, before any worker starts.
        let first_plane = source.read_plane(config.plane_start)?;
        let calibration = calibrate(&first_plane, &config.thresholds)?;
        drop(first_plane);

        let depth = config.window_depth.max(1);
        let pool_size = config.pool_size.max(1);
        info!(
            "detection run: planes [{}, {}), pool {}, window depth {}",
            config.plane_start, config.plane_end, pool_size, depth
        );

        // Capacity equals the window depth: producers can never run more
        // than one window ahead of the consumer.
        let (result_tx, result_rx) = bounded::<PlaneMessage>(depth);
        let (task_tx, task_rx) = unbounded::<PlaneTask>();
        let gate = Arc::new(OrderingGate::new(config.plane_start));

        let consumer = VolumeConsumer::new(
            depth,
            volume_filter,
            sink,
            calibration,
            Arc::clone(&self.metrics),
        );
        let consumer_handle = thread::Builder::new()
            .name("volume-filter".to_string())
            .spawn(move || consumer.run(result_rx))
            .map_err(|error| DetectError::Thread(format!("spawning volume consumer: {}", error)))?;

        let mut workers = Vec::with_capacity(pool_size);
        for worker_index in 0..pool_size {
            let ctx = WorkerContext {
                source: Arc::clone(&source),
                filter: Arc::clone(&self.plane_filter),
                calibration,
                gate: Arc::clone(&gate),
                tasks: task_rx.clone(),
                results: result_tx.clone(),
                metrics: Arc::clone(&self.metrics),
                stall_timeout: config.stall_timeout,
            };
            let handle = thread::Builder::new()
                .name(format!("plane-worker-{}", worker_index))
                .spawn(move || run_worker(ctx))
                .map_err(|error| {
                    DetectError::Thread(format!("spawning plane worker: {}", error))
                })?;
            workers.push(handle);
        }
        drop(task_rx);

        // Dispatch in increasing plane order; workers claim one task at a time.
        for plane_index in config.plane_start..config.plane_end {
            if task_tx.send(PlaneTask { plane_index }).is_err() {
                break;
            }
        }
        drop(task_tx);

        let mut worker_error: Option<DetectError> = None;
        for handle in workers {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    worker_error.get_or_insert(error);
                }
                Err(_) => {
                    gate.abort();
                    worker_error
                        .get_or_insert(DetectError::Thread("plane worker panicked".to_string()));
                }
            }
        }
        debug!("worker pool joined");

        // Exactly one sentinel, strictly after the last worker push. If the
        // consumer already aborted it has dropped its receiver, and that
        // send error is not the failure we want to report.
        let _ = result_tx.send_timeout(PlaneMessage::Sentinel, config.stall_timeout);
        drop(result_tx);

        let consumer_outcome = consumer_handle
            .join()
            .map_err(|_| DetectError::Thread("volume consumer panicked".to_string()))?;

        match (consumer_outcome, worker_error) {
            (Err(error), _) => Err(error),
            (Ok(_), Some(error)) => Err(error),
            (Ok(report), None) => Ok(PipelineReport {
                planes_processed: report.planes_consumed,
                cells_emitted: report.cells_emitted,
                consumer_state: report.state,
            }),
        }
    }
}
