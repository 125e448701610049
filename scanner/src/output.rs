use anyhow::Context;
use serde::Serialize;
use somacore::records::CellDetection;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Summary artifact written next to the CSV detections.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub planes_processed: u64,
    pub planted_count: usize,
    pub detection_count: usize,
}

pub fn write_detections_csv<P: AsRef<Path>>(
    path: P,
    detections: &[CellDetection],
) -> anyhow::Result<()> {
    let path_ref = path.as_ref();
    if let Some(parent) = path_ref.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let mut file = File::create(path_ref)
        .with_context(|| format!("creating detection report {}", path_ref.display()))?;
    writeln!(file, "x,y,z,peak_intensity,voxel_count")?;
    for cell in detections {
        writeln!(
            file,
            "{:.2},{:.2},{:.2},{:.4},{}",
            cell.x, cell.y, cell.z, cell.peak_intensity, cell.voxel_count
        )?;
    }
    Ok(())
}

pub fn write_run_summary<P: AsRef<Path>>(path: P, summary: &RunSummary) -> anyhow::Result<()> {
    let path_ref = path.as_ref();
    if let Some(parent) = path_ref.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(summary).context("serializing run summary")?;
    fs::write(path_ref, contents)
        .with_context(|| format!("writing run summary {}", path_ref.display()))?;
    Ok(())
}
