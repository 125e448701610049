use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use log::{debug, warn};

use crate::pipeline::gate::OrderingGate;
use crate::pipeline::message::{PlaneFailure, PlaneMessage, PlaneResult, PlaneTask};
use crate::prelude::{CalibrationParams, DetectError, DetectResult, PlaneFilter, PlaneSource};
use crate::telemetry::PipelineMetrics;

/// Everything one filtering worker needs, assembled at spawn time.
pub(crate) struct WorkerContext {
    pub source: Arc<dyn PlaneSource>,
    pub filter: Arc<dyn PlaneFilter>,
    pub calibration: CalibrationParams,
    pub gate: Arc<OrderingGate>,
    pub tasks: Receiver<PlaneTask>,
    pub results: Sender<PlaneMessage>,
    pub metrics: Arc<PipelineMetrics>,
    pub stall_timeout: Duration,
}

/// Claims tasks until the dispatcher closes the task channel.
///
/// Filtering runs fully in parallel; only the push is serialized through the
/// gate. A failed plane still takes its turn and pushes a tagged failure, so
/// an error can never stall the successors.
pub(crate) fn run_worker(ctx: WorkerContext) -> DetectResult<()> {
    for task in ctx.tasks.iter() {
        let plane_index = task.plane_index;
        let message = match filter_one(&ctx, plane_index) {
            Ok(result) => {
                ctx.metrics.record_plane_filtered();
                PlaneMessage::Result(result)
            }
            Err(error) => {
                ctx.metrics.record_worker_failure();
                warn!("plane {} failed: {}", plane_index, error);
                PlaneMessage::Failure(PlaneFailure { plane_index, error })
            }
        };

        match ctx.gate.await_turn(plane_index, ctx.stall_timeout) {
            Ok(()) => {}
            // The run is already failing elsewhere; leave quietly.
            Err(DetectError::Aborted(_)) => return Ok(()),
            Err(error) => {
                ctx.gate.abort();
                return Err(error);
            }
        }

        let sent = ctx.results.send_timeout(message, ctx.stall_timeout);
        // Release the successor before inspecting the send outcome so a dead
        // consumer cannot wedge the chain behind this worker.
        ctx.gate.advance(plane_index);
        match sent {
            Ok(()) => debug!("plane {} pushed", plane_index),
            Err(SendTimeoutError::Disconnected(_)) => {
                ctx.gate.abort();
                return Ok(());
            }
            Err(SendTimeoutError::Timeout(_)) => {
                ctx.gate.abort();
                return Err(DetectError::Stalled(format!(
                    "plane {} could not be pushed within the stall timeout",
                    plane_index
                )));
            }
        }
    }
    Ok(())
}

fn filter_one(ctx: &WorkerContext, plane_index: u64) -> DetectResult<PlaneResult> {
    let plane = ctx.source.read_plane(plane_index)?;
    let candidates = ctx.filter.filter_plane(&plane, &ctx.calibration)?;
    Ok(PlaneResult {
        plane_index,
        candidates,
        calibration: ctx.calibration,
    })
}
