use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{debug, info};

use crate::pipeline::message::{PlaneMessage, PlaneResult};
use crate::pipeline::window::RollingWindow;
use crate::prelude::{CalibrationParams, DetectResult, DetectionSink, VolumeFilter};
use crate::telemetry::PipelineMetrics;

/// Lifecycle of the volumetric consumer. Transitions never run backwards;
/// the pipeline is single-pass and non-restartable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Priming,
    Running,
    Draining,
    Terminated,
}

/// Summary handed back by the consumer thread at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerReport {
    pub planes_consumed: u64,
    pub cells_emitted: u64,
    pub state: ConsumerState,
}

pub(crate) struct VolumeConsumer {
    window: RollingWindow,
    filter: Box<dyn VolumeFilter>,
    sink: Box<dyn DetectionSink>,
    calibration: CalibrationParams,
    metrics: Arc<PipelineMetrics>,
    state: ConsumerState,
    planes_consumed: u64,
    cells_emitted: u64,
}

impl VolumeConsumer {
    pub fn new(
        window_depth: usize,
        filter: Box<dyn VolumeFilter>,
        sink: Box<dyn DetectionSink>,
        calibration: CalibrationParams,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            window: RollingWindow::new(window_depth),
            filter,
            sink,
            calibration,
            metrics,
            state: ConsumerState::Priming,
            planes_consumed: 0,
            cells_emitted: 0,
        }
    }

    /// Pulls messages in channel order until the sentinel arrives.
    ///
    /// An early error return drops the receiver, which is what unblocks any
    /// worker still waiting to push.
    pub fn run(mut self, messages: Receiver<PlaneMessage>) -> DetectResult<ConsumerReport> {
        for message in messages.iter() {
            match message {
                PlaneMessage::Sentinel => {
                    self.state = ConsumerState::Draining;
                    debug!("sentinel received after {} planes", self.planes_consumed);
                    break;
                }
                PlaneMessage::Failure(failure) => {
                    return Err(failure.error);
                }
                PlaneMessage::Result(result) => self.consume(result)?,
            }
        }
        self.sink.flush()?;
        self.state = ConsumerState::Terminated;
        info!(
            "volume consumer terminated: {} planes, {} cells",
            self.planes_consumed, self.cells_emitted
        );
        Ok(ConsumerReport {
            planes_consumed: self.planes_consumed,
            cells_emitted: self.cells_emitted,
            state: self.state,
        })
    }

    fn consume(&mut self, result: PlaneResult) -> DetectResult<()> {
        let plane_index = result.plane_index;
        self.window.push(result)?;
        let detections = self.filter.filter_volume(&self.window, &self.calibration)?;
        if self.state == ConsumerState::Priming {
            // The first pass ran against a single-plane window; the kernel is
            // now established.
            self.state = ConsumerState::Running;
        }
        if !detections.is_empty() {
            self.sink.persist(&detections)?;
            self.metrics.record_cells(detections.len() as u64);
            self.cells_emitted += detections.len() as u64;
        }
        self.planes_consumed += 1;
        debug!("plane {} consumed", plane_index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::message::PlaneFailure;
    use crate::prelude::{CollectSink, DetectError};
    use crate::records::CellDetection;
    use crossbeam_channel::unbounded;
    use std::sync::Mutex;

    fn calibration() -> CalibrationParams {
        CalibrationParams {
            clipping_value: 1.0,
            threshold_value: 0.5,
        }
    }

    fn result(plane_index: u64) -> PlaneResult {
        PlaneResult {
            plane_index,
            candidates: Vec::new(),
            calibration: calibration(),
        }
    }

    /// Records the window length seen on every pass.
    struct RecordingFilter {
        lens: Arc<Mutex<Vec<usize>>>,
    }

    impl VolumeFilter for RecordingFilter {
        fn filter_volume(
            &mut self,
            window: &RollingWindow,
            _calibration: &CalibrationParams,
        ) -> DetectResult<Vec<CellDetection>> {
            self.lens.lock().unwrap().push(window.len());
            Ok(Vec::new())
        }
    }

    fn consumer_with_recording(
        lens: Arc<Mutex<Vec<usize>>>,
    ) -> VolumeConsumer {
        VolumeConsumer::new(
            3,
            Box::new(RecordingFilter { lens }),
            Box::new(CollectSink::new()),
            calibration(),
            Arc::new(PipelineMetrics::new()),
        )
    }

    #[test]
    fn sentinel_terminates_after_all_results() {
        let lens = Arc::new(Mutex::new(Vec::new()));
        let consumer = consumer_with_recording(Arc::clone(&lens));
        let (tx, rx) = unbounded();
        for index in 0..4 {
            tx.send(PlaneMessage::Result(result(index))).unwrap();
        }
        tx.send(PlaneMessage::Sentinel).unwrap();

        let report = consumer.run(rx).unwrap();
        assert_eq!(report.planes_consumed, 4);
        assert_eq!(report.state, ConsumerState::Terminated);
        assert_eq!(lens.lock().unwrap().len(), 4);
    }

    #[test]
    fn first_volumetric_pass_runs_after_one_result() {
        let lens = Arc::new(Mutex::new(Vec::new()));
        let consumer = consumer_with_recording(Arc::clone(&lens));
        let (tx, rx) = unbounded();
        for index in 0..3 {
            tx.send(PlaneMessage::Result(result(index))).unwrap();
        }
        tx.send(PlaneMessage::Sentinel).unwrap();

        consumer.run(rx).unwrap();
        assert_eq!(lens.lock().unwrap().first().copied(), Some(1));
    }

    #[test]
    fn tagged_failure_aborts_the_consumer() {
        let lens = Arc::new(Mutex::new(Vec::new()));
        let consumer = consumer_with_recording(lens);
        let (tx, rx) = unbounded();
        tx.send(PlaneMessage::Result(result(0))).unwrap();
        tx.send(PlaneMessage::Failure(PlaneFailure {
            plane_index: 1,
            error: DetectError::PlaneFilter {
                plane: 1,
                message: "unreadable".to_string(),
            },
        }))
        .unwrap();

        let outcome = consumer.run(rx);
        assert!(matches!(
            outcome,
            Err(DetectError::PlaneFilter { plane: 1, .. })
        ));
    }

    #[test]
    fn out_of_order_result_is_a_window_gap() {
        let lens = Arc::new(Mutex::new(Vec::new()));
        let consumer = consumer_with_recording(lens);
        let (tx, rx) = unbounded();
        tx.send(PlaneMessage::Result(result(0))).unwrap();
        tx.send(PlaneMessage::Result(result(2))).unwrap();

        let outcome = consumer.run(rx);
        assert!(matches!(
            outcome,
            Err(DetectError::WindowGap {
                expected: 1,
                received: 2
            })
        ));
    }
}
