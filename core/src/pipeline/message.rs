use crate::prelude::{CalibrationParams, DetectError};
use crate::records::PlaneCandidate;

/// Unit of work claimed by exactly one filtering worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneTask {
    pub plane_index: u64,
}

/// Successful output of one plane-filter pass. Ownership moves to the
/// channel, then to the consumer; never mutated after creation.
#[derive(Debug, Clone)]
pub struct PlaneResult {
    pub plane_index: u64,
    pub candidates: Vec<PlaneCandidate>,
    pub calibration: CalibrationParams,
}

/// Tagged failure pushed through the hand-off chain in place of a result so
/// a broken plane never stalls its successors.
#[derive(Debug)]
pub struct PlaneFailure {
    pub plane_index: u64,
    pub error: DetectError,
}

/// Currency of the bounded hand-off channel. The sentinel is pushed exactly
/// once per run, strictly after every worker has completed its push.
#[derive(Debug)]
pub enum PlaneMessage {
    Result(PlaneResult),
    Failure(PlaneFailure),
    Sentinel,
}

impl PlaneMessage {
    pub fn plane_index(&self) -> Option<u64> {
        match self {
            PlaneMessage::Result(result) => Some(result.plane_index),
            PlaneMessage::Failure(failure) => Some(failure.plane_index),
            PlaneMessage::Sentinel => None,
        }
    }
}
