//! Detection core for the volumetric cell-screening platform.
//!
//! Planes are filtered in parallel by a pool of worker threads, pushed in
//! strict plane order through a window-sized bounded channel, and consumed
//! by a single volumetric filter. The modules provide the pipeline, its
//! collaborator seams, and the concrete intensity and window filters.

pub mod filters;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod records;
pub mod stack;
pub mod telemetry;

pub use pipeline::{DetectionPipeline, PipelineReport};
pub use prelude::{CalibrationParams, DetectError, DetectResult, DetectionConfig};
