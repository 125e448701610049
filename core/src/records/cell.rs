use serde::{Deserialize, Serialize};

/// Cell detection emitted by the volumetric filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellDetection {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub peak_intensity: f32,
    pub voxel_count: usize,
}

impl CellDetection {
    pub fn new(x: f32, y: f32, z: f32, peak_intensity: f32, voxel_count: usize) -> Self {
        Self {
            x,
            y,
            z,
            peak_intensity,
            voxel_count,
        }
    }
}
