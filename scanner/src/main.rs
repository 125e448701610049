use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use workflow::config::RunConfig;
use workflow::runner::Runner;

mod generator;
mod output;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver for the volumetric cell-screening pipeline")]
struct Args {
    /// Load a run config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 64)]
    width: usize,
    #[arg(long, default_value_t = 64)]
    height: usize,
    #[arg(long, default_value_t = 12)]
    planes: usize,
    /// Depth of the volumetric window, and the hand-off channel capacity
    #[arg(long, default_value_t = 3)]
    window_depth: usize,
    /// Worker pool size; 0 selects cores minus a reserved margin
    #[arg(long, default_value_t = 0)]
    pool_size: usize,
    #[arg(long, default_value_t = 2)]
    cells: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Directory for the CSV and JSON report artifacts
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let run_config = if let Some(path) = args.workflow {
        RunConfig::load(path)?
    } else {
        let mut config = RunConfig::default();
        config.volume.width = args.width;
        config.volume.height = args.height;
        config.volume.planes = args.planes;
        config.volume.cell_count = args.cells;
        config.volume.seed = args.seed;
        config.window_depth = args.window_depth;
        config.pool_size = args.pool_size;
        config
    };

    let runner = Runner::new(run_config);
    let result = runner.execute()?;

    println!(
        "Detection run -> planes {}, planted {}, detected {}",
        result.planes_processed,
        result.planted.len(),
        result.detections.len()
    );

    let csv_path = args.report_dir.join("detections.csv");
    output::write_detections_csv(&csv_path, &result.detections)
        .context("writing detection csv")?;

    let summary = output::RunSummary {
        planes_processed: result.planes_processed,
        planted_count: result.planted.len(),
        detection_count: result.detections.len(),
    };
    let summary_path = args.report_dir.join("summary.json");
    output::write_run_summary(&summary_path, &summary).context("writing run summary")?;

    Ok(())
}
