use std::collections::VecDeque;

use log::debug;

use crate::pipeline::window::RollingWindow;
use crate::prelude::{CalibrationParams, DetectResult, DetectionThresholds, VolumeFilter};
use crate::records::CellDetection;

/// Second-stage filter: corroborates plane candidates across the rolling
/// window and size-filters the surviving structures.
///
/// A centre-plane candidate becomes a cell when every plane of a full window
/// carries a candidate within the soma radius. Cells already reported from a
/// nearby centre are suppressed so one soma is not emitted once per slice.
pub struct WindowVolumeFilter {
    soma_radius_px: f32,
    min_cell_volume: usize,
    max_cell_volume: usize,
    kernel_depth: Option<usize>,
    recent: VecDeque<CellDetection>,
}

impl WindowVolumeFilter {
    pub fn new(thresholds: &DetectionThresholds) -> Self {
        Self {
            soma_radius_px: thresholds.soma_radius_px,
            min_cell_volume: thresholds.min_cell_volume,
            max_cell_volume: thresholds.max_cell_volume,
            kernel_depth: None,
            recent: VecDeque::new(),
        }
    }

    fn is_duplicate(&self, cell: &CellDetection) -> bool {
        self.recent.iter().any(|seen| {
            let dx = seen.x - cell.x;
            let dy = seen.y - cell.y;
            (dx * dx + dy * dy).sqrt() <= self.soma_radius_px
        })
    }

    fn prune_recent(&mut self, centre_index: u64, depth: usize) {
        while let Some(front) = self.recent.front() {
            if (front.z as u64) + (depth as u64) < centre_index {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

impl VolumeFilter for WindowVolumeFilter {
    fn filter_volume(
        &mut self,
        window: &RollingWindow,
        _calibration: &CalibrationParams,
    ) -> DetectResult<Vec<CellDetection>> {
        if self.kernel_depth.is_none() {
            // First pass runs against a single-plane window and fixes the
            // kernel geometry for the rest of the run.
            self.kernel_depth = Some(window.depth());
            debug!("volume kernel primed at depth {}", window.depth());
        }
        if !window.is_full() {
            return Ok(Vec::new());
        }
        let centre = match window.centre() {
            Some(centre) => centre,
            None => return Ok(Vec::new()),
        };
        let centre_index = centre.plane_index;
        let depth = window.depth();

        let mut cells = Vec::new();
        for candidate in &centre.candidates {
            let mut voxel_count = 0_usize;
            let mut peak = 0.0_f32;
            let mut corroborated = true;

            for plane in window.planes() {
                let mut matched = false;
                for other in &plane.candidates {
                    if other.distance_to(candidate.x, candidate.y) <= self.soma_radius_px {
                        matched = true;
                        voxel_count += other.pixel_count;
                        peak = peak.max(other.peak_intensity);
                    }
                }
                if !matched {
                    corroborated = false;
                    break;
                }
            }

            if !corroborated {
                continue;
            }
            if voxel_count < self.min_cell_volume || voxel_count > self.max_cell_volume {
                continue;
            }

            let cell = CellDetection::new(
                candidate.x,
                candidate.y,
                centre_index as f32,
                peak,
                voxel_count,
            );
            cells.push(cell);
        }

        self.prune_recent(centre_index, depth);
        let mut fresh = Vec::new();
        for cell in cells {
            if self.is_duplicate(&cell) {
                continue;
            }
            self.recent.push_back(cell.clone());
            fresh.push(cell);
        }
        Ok(fresh)
    }
}
