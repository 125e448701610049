use anyhow::{bail, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use somacore::stack::InMemoryStack;

/// Configuration for generating a synthetic image stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub width: usize,
    pub height: usize,
    pub planes: usize,
    pub cell_count: usize,
    pub cell_radius: f32,
    pub cell_peak: f32,
    pub noise: f32,
    pub seed: u64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            planes: 12,
            cell_count: 2,
            cell_radius: 2.5,
            cell_peak: 1.0,
            noise: 0.05,
            seed: 0,
        }
    }
}

/// Ground-truth position of a cell implanted into the synthetic stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlantedCell {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Synthetic stack plus the ground truth it was built from.
pub struct SyntheticVolume {
    pub stack: InMemoryStack,
    pub cells: Vec<PlantedCell>,
}

/// Builds a noise-floor stack with bright spherical cells at seeded
/// positions. The first planes are kept cell-free so calibration sees pure
/// background.
pub fn build_synthetic_volume(config: &VolumeConfig) -> anyhow::Result<SyntheticVolume> {
    if config.width == 0 || config.height == 0 || config.planes == 0 {
        bail!(
            "degenerate volume {}x{}x{}",
            config.width,
            config.height,
            config.planes
        );
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let cells = place_cells(&mut rng, config)?;

    let radius_sq = config.cell_radius * config.cell_radius;
    let mut planes = Vec::with_capacity(config.planes);
    for z in 0..config.planes {
        let mut pixels = Vec::with_capacity(config.width * config.height);
        for y in 0..config.height {
            for x in 0..config.width {
                let mut value = rng.gen_range(0.0..config.noise);
                for cell in &cells {
                    let dx = x as f32 - cell.x;
                    let dy = y as f32 - cell.y;
                    let dz = z as f32 - cell.z;
                    let dist_sq = dx * dx + dy * dy + dz * dz;
                    if dist_sq <= radius_sq {
                        let falloff = 1.0 - 0.75 * (dist_sq / radius_sq);
                        value = value.max(config.cell_peak * falloff);
                    }
                }
                pixels.push(value);
            }
        }
        planes.push(pixels);
    }

    let stack = InMemoryStack::from_raw_planes(0, config.width, config.height, planes)
        .context("assembling synthetic stack")?;
    Ok(SyntheticVolume { stack, cells })
}

fn place_cells(rng: &mut StdRng, config: &VolumeConfig) -> anyhow::Result<Vec<PlantedCell>> {
    let xy_margin = config.cell_radius * 3.0;
    let z_margin = config.cell_radius + 2.0;
    let min_separation = config.cell_radius * 6.0;

    let x_max = config.width as f32 - xy_margin;
    let y_max = config.height as f32 - xy_margin;
    let z_max = config.planes as f32 - z_margin;
    if x_max <= xy_margin || y_max <= xy_margin || z_max <= z_margin {
        bail!(
            "volume {}x{}x{} is too small for cells of radius {}",
            config.width,
            config.height,
            config.planes,
            config.cell_radius
        );
    }

    let mut cells: Vec<PlantedCell> = Vec::with_capacity(config.cell_count);
    let mut attempts = 0;
    while cells.len() < config.cell_count {
        attempts += 1;
        if attempts > 1000 {
            bail!(
                "could not place {} separated cells in a {}x{}x{} volume",
                config.cell_count,
                config.width,
                config.height,
                config.planes
            );
        }
        let candidate = PlantedCell {
            x: rng.gen_range(xy_margin..x_max),
            y: rng.gen_range(xy_margin..y_max),
            z: rng.gen_range(z_margin..z_max),
        };
        let separated = cells.iter().all(|cell| {
            let dx = cell.x - candidate.x;
            let dy = cell.y - candidate.y;
            let dz = cell.z - candidate.z;
            (dx * dx + dy * dy + dz * dz).sqrt() >= min_separation
        });
        if separated {
            cells.push(candidate);
        }
    }
    Ok(cells)
}
