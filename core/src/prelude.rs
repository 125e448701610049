use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::window::RollingWindow;
use crate::records::{CellDetection, PlaneCandidate};
use crate::stack::Plane;

/// Cores held back from the filtering pool on shared machines.
const RESERVED_CORES: usize = 2;

/// Worker count used when the caller does not pin one explicitly.
pub fn default_pool_size() -> usize {
    num_cpus::get().saturating_sub(RESERVED_CORES).max(1)
}

/// Tunable thresholds forwarded to the plane and volume filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    /// Standard deviations above the first plane's mean for the pixel threshold.
    pub n_sds_above_mean: f32,
    /// Fraction of the first plane's maximum used as the clipping value.
    pub clip_fraction: f32,
    /// Radius within which candidates on adjacent planes belong to one soma.
    pub soma_radius_px: f32,
    pub min_cell_volume: usize,
    pub max_cell_volume: usize,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            n_sds_above_mean: 8.0,
            clip_fraction: 0.98,
            soma_radius_px: 5.0,
            min_cell_volume: 10,
            max_cell_volume: 10_000,
        }
    }
}

/// Shared configuration for one detection run.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// First plane index to process.
    pub plane_start: u64,
    /// One past the last plane index to process.
    pub plane_end: u64,
    /// Depth of the volumetric sliding window; also the hand-off channel capacity.
    pub window_depth: usize,
    pub pool_size: usize,
    pub thresholds: DetectionThresholds,
    /// Upper bound on any single gate wait or channel push.
    pub stall_timeout: Duration,
}

impl DetectionConfig {
    pub fn new(plane_start: u64, plane_end: u64, window_depth: usize) -> Self {
        Self {
            plane_start,
            plane_end,
            window_depth,
            pool_size: default_pool_size(),
            thresholds: DetectionThresholds::default(),
            stall_timeout: Duration::from_secs(30),
        }
    }

    pub fn plane_count(&self) -> u64 {
        self.plane_end.saturating_sub(self.plane_start)
    }
}

/// Per-run intensity parameters computed once from the first plane and shared
/// read-only by every worker and the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub clipping_value: f32,
    pub threshold_value: f32,
}

/// Common error type for the detection pipeline.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("empty plane range: start {start} is not below end {end}")]
    EmptyRange { start: u64, end: u64 },
    #[error("calibration failed: {0}")]
    Calibration(String),
    #[error("reading plane {plane}: {message}")]
    PlaneRead { plane: u64, message: String },
    #[error("filtering plane {plane}: {message}")]
    PlaneFilter { plane: u64, message: String },
    #[error("plane sequence gap: expected {expected}, received {received}")]
    WindowGap { expected: u64, received: u64 },
    #[error("pipeline stalled: {0}")]
    Stalled(String),
    #[error("pipeline aborted: {0}")]
    Aborted(String),
    #[error("persisting detections: {0}")]
    Persist(String),
    #[error("thread failure: {0}")]
    Thread(String),
}

pub type DetectResult<T> = Result<T, DetectError>;

/// Read-only source of planes, shared across the filtering workers.
pub trait PlaneSource: Send + Sync {
    /// Half-open range of plane indices this source can serve.
    fn plane_range(&self) -> (u64, u64);

    fn read_plane(&self, index: u64) -> DetectResult<Plane>;
}

/// Per-plane candidate extraction. Pure with respect to plane and calibration.
pub trait PlaneFilter: Send + Sync {
    fn filter_plane(
        &self,
        plane: &Plane,
        calibration: &CalibrationParams,
    ) -> DetectResult<Vec<PlaneCandidate>>;
}

/// Cross-plane filter, driven once per consumed plane against the rolling window.
pub trait VolumeFilter: Send {
    fn filter_volume(
        &mut self,
        window: &RollingWindow,
        calibration: &CalibrationParams,
    ) -> DetectResult<Vec<CellDetection>>;
}

/// Receives detections after each volumetric pass.
pub trait DetectionSink: Send {
    fn persist(&mut self, detections: &[CellDetection]) -> DetectResult<()>;

    /// Called once while the pipeline drains, after the last volumetric pass.
    fn flush(&mut self) -> DetectResult<()> {
        Ok(())
    }
}

/// Sink that buffers detections in memory; clones share one buffer.
#[derive(Clone, Default)]
pub struct CollectSink {
    collected: Arc<Mutex<Vec<CellDetection>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detections(&self) -> Vec<CellDetection> {
        match self.collected.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl DetectionSink for CollectSink {
    fn persist(&mut self, detections: &[CellDetection]) -> DetectResult<()> {
        let mut guard = self
            .collected
            .lock()
            .map_err(|_| DetectError::Persist("collect sink lock poisoned".to_string()))?;
        guard.extend_from_slice(detections);
        Ok(())
    }
}
