use std::sync::Arc;

use anyhow::Context;
use log::info;
use somacore::filters::WindowVolumeFilter;
use somacore::prelude::CollectSink;
use somacore::records::CellDetection;
use somacore::DetectionPipeline;

use crate::generator::volume::{build_synthetic_volume, PlantedCell};
use crate::workflow::config::RunConfig;

pub struct RunResult {
    pub planes_processed: u64,
    pub detections: Vec<CellDetection>,
    pub planted: Vec<PlantedCell>,
}

#[derive(Clone)]
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<RunResult> {
        let volume =
            build_synthetic_volume(&self.config.volume).context("building synthetic volume")?;
        let detection_config = self.config.to_detection_config();
        let volume_filter = WindowVolumeFilter::new(&detection_config.thresholds);
        let sink = CollectSink::new();

        let pipeline = DetectionPipeline::new(detection_config);
        let report = pipeline
            .run(
                Arc::new(volume.stack),
                Box::new(volume_filter),
                Box::new(sink.clone()),
            )
            .context("executing detection pipeline")?;
        info!(
            "pipeline complete: {} planes, {} cells",
            report.planes_processed, report.cells_emitted
        );

        Ok(RunResult {
            planes_processed: report.planes_processed,
            detections: sink.detections(),
            planted: volume.cells,
        })
    }
}
